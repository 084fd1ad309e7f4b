//! 生命周期通知消息
//!
//! 服务端在每次订单状态变更时发布 [`Notification`]，由通知接收端
//! （SSE / 消息队列 / 空实现）投递到指定频道，尽力而为，不保证送达。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod payload;
pub use payload::*;

/// 通知频道
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Channel {
    Customer(String),
    Vendor(String),
    Rider(String),
    /// 所有在线骑手
    Riders,
    Admin,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Customer(id) => write!(f, "customer:{}", id),
            Channel::Vendor(id) => write!(f, "vendor:{}", id),
            Channel::Rider(id) => write!(f, "rider:{}", id),
            Channel::Riders => write!(f, "riders"),
            Channel::Admin => write!(f, "admin"),
        }
    }
}

/// Error parsing a channel name such as `rider:r1`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid channel: {0}")]
pub struct InvalidChannel(pub String);

impl FromStr for Channel {
    type Err = InvalidChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "riders" => return Ok(Channel::Riders),
            "admin" => return Ok(Channel::Admin),
            _ => {}
        }
        let (kind, id) = s
            .split_once(':')
            .filter(|(_, id)| !id.is_empty())
            .ok_or_else(|| InvalidChannel(s.to_string()))?;
        match kind {
            "customer" => Ok(Channel::Customer(id.to_string())),
            "vendor" => Ok(Channel::Vendor(id.to_string())),
            "rider" => Ok(Channel::Rider(id.to_string())),
            _ => Err(InvalidChannel(s.to_string())),
        }
    }
}

/// 已投递的通知
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub channel: Channel,
    pub event: LifecycleEvent,
    pub timestamp: i64,
}

impl Notification {
    pub fn new(channel: Channel, event: LifecycleEvent) -> Self {
        Self {
            channel,
            event,
            timestamp: crate::util::now_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_parse_display() {
        for name in ["customer:c1", "vendor:v9", "rider:r2", "riders", "admin"] {
            let channel: Channel = name.parse().unwrap();
            assert_eq!(channel.to_string(), name);
        }
        assert!("rider:".parse::<Channel>().is_err());
        assert!("kitchen:k1".parse::<Channel>().is_err());
        assert!("everyone".parse::<Channel>().is_err());
    }

    #[test]
    fn test_channel_serde() {
        let json = serde_json::to_string(&Channel::Rider("r1".into())).unwrap();
        assert_eq!(json, r#"{"kind":"rider","id":"r1"}"#);
        let json = serde_json::to_string(&Channel::Riders).unwrap();
        assert_eq!(json, r#"{"kind":"riders"}"#);
    }
}
