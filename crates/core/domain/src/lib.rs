pub mod authorization;
pub mod data;

pub use authorization::{AuthorizationStatus, ParseAuthorizationStatusError};
pub use data::PositionSample;
