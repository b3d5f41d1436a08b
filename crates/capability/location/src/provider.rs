//! 平台协作方抽象（权限提供者、定位源）。

use domain::{AuthorizationStatus, PositionSample};
use std::sync::Arc;

/// 授权状态变化处理器。
pub trait AuthorizationHandler: Send + Sync {
    fn on_status_changed(&self, status: AuthorizationStatus);
}

/// 权限提供者抽象。
pub trait PermissionProvider: Send + Sync {
    /// 平台当前的授权状态。
    fn current_status(&self) -> AuthorizationStatus;

    /// 发起授权请求（弹窗）。结果稍后经已注册的处理器回调，本方法不等待。
    fn request_authorization(&self);

    /// 注册状态变化处理器；再次注册会替换之前的处理器。
    fn subscribe(&self, handler: Arc<dyn AuthorizationHandler>);
}

/// 位置批次处理器。
pub trait PositionBatchHandler: Send + Sync {
    fn on_batch(&self, batch: Vec<PositionSample>);
}

/// 定位源抽象。
pub trait PositionSource: Send + Sync {
    /// 开始推送位置批次；再次调用会替换之前注册的处理器。
    fn start_updates(&self, handler: Arc<dyn PositionBatchHandler>);

    /// 停止推送。
    fn stop_updates(&self);
}
