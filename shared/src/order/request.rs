//! Request / response payloads for lifecycle operations

use super::record::Order;
use super::types::{OrderItemInput, OrderStatus, PaymentMethod, PaymentProof};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// CreateOrder input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: String,
    pub items: Vec<OrderItemInput>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_proof: Option<PaymentProof>,
    /// Client-computed subtotal, advisory only
    #[serde(default)]
    pub client_subtotal: Option<Decimal>,
}

/// Vendor-side action (preparing / ready)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorActionRequest {
    pub vendor_id: String,
}

/// Rider-side action (claim / reject / pickup)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiderActionRequest {
    pub rider_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverRequest {
    pub rider_id: String,
    /// 1..=5
    #[serde(default)]
    pub rating: Option<u8>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderListQuery {
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

/// Per-vendor settlement result reported by DeliverOrder
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VendorSettlementResult {
    Applied {
        vendor_id: String,
        vendor_income: Decimal,
    },
    /// Queued for retry by the settlement worker
    Deferred { vendor_id: String, error: String },
}

impl VendorSettlementResult {
    pub fn vendor_id(&self) -> &str {
        match self {
            Self::Applied { vendor_id, .. } | Self::Deferred { vendor_id, .. } => vendor_id,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// DeliverOrder result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub order: Order,
    pub rider_fee: Decimal,
    pub vendor_settlements: Vec<VendorSettlementResult>,
}
