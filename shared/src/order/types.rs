//! Order value types shared by the server and clients

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// Status
// ============================================================================

/// 订单状态
///
/// ```text
/// Pending -> Confirmed -> (Preparing) -> ReadyForPickup -> OutForDelivery -> Delivered
/// Pending | Confirmed | Preparing | ReadyForPickup -> Cancelled
/// OutForDelivery (before pickup) -> Confirmed   (rider rejects)
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Preparing,
    ReadyForPickup,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Delivered / Cancelled
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// 准备时限监控中的状态
    pub fn is_preparing_window(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Preparing)
    }

    /// 可取消的状态（骑手接单之前）
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            Self::Pending | Self::Confirmed | Self::Preparing | Self::ReadyForPickup
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Preparing => "PREPARING",
            Self::ReadyForPickup => "READY_FOR_PICKUP",
            Self::OutForDelivery => "OUT_FOR_DELIVERY",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 骑手侧的订单子状态，必须与订单本身状态保持一致
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiderOrderStatus {
    Assigned,
    PickedUp,
    Delivered,
    Cancelled,
}

// ============================================================================
// Payment
// ============================================================================

/// 支付方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// 货到付款（现金由商家/骑手线下收取）
    CashOnDelivery,
    /// 在线预付
    OnlinePrepaid,
}

impl PaymentMethod {
    pub fn is_online(&self) -> bool {
        matches!(self, Self::OnlinePrepaid)
    }
}

/// Proof returned by the payment provider after authorizing a charge
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentProof {
    /// Provider-side order reference
    pub provider_order_id: String,
    /// Provider payment id, backs at most one order
    pub payment_id: String,
    /// Amount the provider authorized, must equal the order total
    pub amount: Decimal,
    /// Hex-encoded HMAC signature over `provider_order_id|payment_id|amount`
    /// (amount with two decimals)
    pub signature: String,
}

// ============================================================================
// Items
// ============================================================================

/// Priced order line, resolved from the catalog at creation time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub product_id: String,
    pub vendor_id: String,
    pub name: String,
    /// Catalog unit price at order time
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl OrderItem {
    /// unit_price × quantity
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Client-submitted line (price is never taken from the client)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderItemInput {
    pub product_id: String,
    pub quantity: u32,
}

/// 状态变更记录（追加写入）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusChange {
    pub status: OrderStatus,
    pub at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}
