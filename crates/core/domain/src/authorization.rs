//! 定位授权状态。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 平台上报的定位授权状态。
///
/// 只会经由权限提供者的回调从 `Undetermined` 单向流转到其余四种之一。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    /// 用户尚未作出选择
    Undetermined,
    /// 用户拒绝
    Denied,
    /// 已授权（模糊定位）
    AuthorizedLimited,
    /// 已授权（精确定位）
    AuthorizedFull,
    /// 系统策略限制（家长控制等），用户无法更改
    Restricted,
}

impl AuthorizationStatus {
    /// 是否允许开始定位。
    pub fn is_authorized(self) -> bool {
        matches!(self, Self::AuthorizedFull | Self::AuthorizedLimited)
    }

    /// 用户是否已作出选择。
    pub fn is_determined(self) -> bool {
        !matches!(self, Self::Undetermined)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Undetermined => "undetermined",
            Self::Denied => "denied",
            Self::AuthorizedLimited => "authorized_limited",
            Self::AuthorizedFull => "authorized_full",
            Self::Restricted => "restricted",
        }
    }
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 授权状态解析错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown authorization status: {0}")]
pub struct ParseAuthorizationStatusError(pub String);

impl FromStr for AuthorizationStatus {
    type Err = ParseAuthorizationStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "undetermined" | "not_determined" => Ok(Self::Undetermined),
            "denied" => Ok(Self::Denied),
            "authorized_limited" | "limited" => Ok(Self::AuthorizedLimited),
            "authorized_full" | "full" | "authorized" => Ok(Self::AuthorizedFull),
            "restricted" => Ok(Self::Restricted),
            _ => Err(ParseAuthorizationStatusError(value.to_string())),
        }
    }
}
