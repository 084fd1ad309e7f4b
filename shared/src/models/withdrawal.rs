//! Withdrawal Model

use super::account::{BankDetails, Role};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 提现状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WithdrawalStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl WithdrawalStatus {
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Payout record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Withdrawal {
    pub id: String,
    pub account_id: String,
    pub role: Role,
    /// Requested (gross) amount
    pub amount: Decimal,
    /// 2% payout fee
    pub fee: Decimal,
    /// amount - fee
    pub net_amount: Decimal,
    pub status: WithdrawalStatus,
    pub requested_at: i64,
    #[serde(default)]
    pub processed_at: Option<i64>,
    /// Destination snapshot taken at request time
    pub bank: BankDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Request withdrawal payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub account_id: String,
    pub amount: Decimal,
}

/// Administrative outcome for a pending withdrawal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WithdrawalOutcome {
    Complete,
    Fail,
    Cancel,
}

impl WithdrawalOutcome {
    pub fn target_status(&self) -> WithdrawalStatus {
        match self {
            Self::Complete => WithdrawalStatus::Completed,
            Self::Fail => WithdrawalStatus::Failed,
            Self::Cancel => WithdrawalStatus::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessWithdrawalRequest {
    pub outcome: WithdrawalOutcome,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WithdrawalListQuery {
    #[serde(default)]
    pub account_id: Option<String>,
}
