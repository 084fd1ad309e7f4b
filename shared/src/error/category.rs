//! 错误码分段

use super::codes::ErrorCode;
use serde::{Deserialize, Serialize};

/// 按错误码千位分段归类
///
/// | 段 | 归属 |
/// |----|------|
/// | 0xxx | 通用 |
/// | 1xxx..3xxx | 账户与权限 |
/// | 4xxx | 订单状态机 |
/// | 5xxx | 支付校验 |
/// | 6xxx | 商品与商家 |
/// | 7xxx | 骑手抢单 |
/// | 8xxx | 钱包与提现 |
/// | 9xxx 及以上 | 系统 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    General,
    Permission,
    Order,
    Payment,
    Catalog,
    Assignment,
    Wallet,
    System,
}

impl ErrorCategory {
    pub const fn from_code(code: u16) -> Self {
        match code / 1000 {
            0 => Self::General,
            1..=3 => Self::Permission,
            4 => Self::Order,
            5 => Self::Payment,
            6 => Self::Catalog,
            7 => Self::Assignment,
            8 => Self::Wallet,
            _ => Self::System,
        }
    }

    /// 该类错误是否由调用方引起（重试同样请求不会成功）
    pub const fn is_caller_fault(self) -> bool {
        !matches!(self, Self::System)
    }
}

impl ErrorCode {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(self.code())
    }
}
