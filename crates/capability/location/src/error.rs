//! 定位流错误类型定义

use domain::AuthorizationStatus;

/// 定位流错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    /// 授权结果不是 `AuthorizedFull` / `AuthorizedLimited`
    #[error("location access denied: {0}")]
    AccessDenied(AuthorizationStatus),
}
