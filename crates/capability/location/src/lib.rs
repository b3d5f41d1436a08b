//! # 定位流能力模块
//!
//! 把平台定位服务的两类回调（授权状态变化、位置批次）包装成一个拉取式异步流：
//! - **授权握手**：状态未决时发起一次授权请求，挂起 `start` 直到平台回调给出结果
//! - **位置流**：授权通过后向定位源注册转发器，按到达顺序把样本送入 [`LocationStream`]
//! - **取消**：消费方关闭或丢弃流时，适配器自行 `stop`，定位源不会在无人监听时继续运行
//!
//! ## 架构设计
//!
//! ```text
//! PermissionProvider ──on_status_changed──┐
//!                                          ▼
//! caller ── start() ──► LocationStreamAdapter ──start_updates──► PositionSource
//!    ▲                         │      ▲                                │
//!    │                         │      └──────────on_batch──────────────┘
//!    └──── LocationStream ◄────┘ (mpsc)
//! ```
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! let adapter = LocationStreamAdapter::new(permission, source);
//! let mut stream = adapter.start().await?;
//! while let Some(sample) = stream.next().await {
//!     println!("{} {}", sample.latitude, sample.longitude);
//! }
//! ```

mod adapter;
mod error;
mod provider;
pub mod simulated;
mod stream;

pub use adapter::LocationStreamAdapter;
pub use error::LocationError;
pub use provider::{AuthorizationHandler, PermissionProvider, PositionBatchHandler, PositionSource};
pub use stream::LocationStream;
