//! Lifecycle event payloads

use crate::models::WithdrawalStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 订单生命周期事件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleEvent {
    OrderPlaced {
        order_id: String,
        customer_id: String,
        total: Decimal,
    },
    OrderConfirmed {
        order_id: String,
        preparation_deadline: i64,
    },
    PreparationStarted {
        order_id: String,
    },
    /// 出餐广播（骑手端 30 秒内可抢单）
    FoodReady {
        order_id: String,
        vendor_ids: Vec<String>,
        offer_expires_at: i64,
    },
    OrderClaimed {
        order_id: String,
        rider_id: String,
    },
    /// 骑手取货前放弃订单
    ClaimReleased {
        order_id: String,
        rider_id: String,
    },
    OrderPickedUp {
        order_id: String,
        rider_id: String,
    },
    OrderDelivered {
        order_id: String,
        rider_id: String,
        delivered_at: i64,
    },
    OrderCancelled {
        order_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    LateFeeApplied {
        order_id: String,
        vendor_id: String,
        amount: Decimal,
    },
    VendorSettlementDeferred {
        order_id: String,
        vendor_id: String,
        error: String,
    },
    WithdrawalProcessed {
        withdrawal_id: String,
        account_id: String,
        status: WithdrawalStatus,
        net_amount: Decimal,
    },
}

impl LifecycleEvent {
    /// Event name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::OrderPlaced { .. } => "order_placed",
            Self::OrderConfirmed { .. } => "order_confirmed",
            Self::PreparationStarted { .. } => "preparation_started",
            Self::FoodReady { .. } => "food_ready",
            Self::OrderClaimed { .. } => "order_claimed",
            Self::ClaimReleased { .. } => "claim_released",
            Self::OrderPickedUp { .. } => "order_picked_up",
            Self::OrderDelivered { .. } => "order_delivered",
            Self::OrderCancelled { .. } => "order_cancelled",
            Self::LateFeeApplied { .. } => "late_fee_applied",
            Self::VendorSettlementDeferred { .. } => "vendor_settlement_deferred",
            Self::WithdrawalProcessed { .. } => "withdrawal_processed",
        }
    }

    /// Related order, if any
    pub fn order_id(&self) -> Option<&str> {
        match self {
            Self::OrderPlaced { order_id, .. }
            | Self::OrderConfirmed { order_id, .. }
            | Self::PreparationStarted { order_id }
            | Self::FoodReady { order_id, .. }
            | Self::OrderClaimed { order_id, .. }
            | Self::ClaimReleased { order_id, .. }
            | Self::OrderPickedUp { order_id, .. }
            | Self::OrderDelivered { order_id, .. }
            | Self::OrderCancelled { order_id, .. }
            | Self::LateFeeApplied { order_id, .. }
            | Self::VendorSettlementDeferred { order_id, .. } => Some(order_id),
            Self::WithdrawalProcessed { .. } => None,
        }
    }
}
