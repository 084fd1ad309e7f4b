//! Persisted order record

use super::types::{OrderItem, OrderStatus, PaymentMethod, PaymentProof, StatusChange};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order record as stored in the ledger
///
/// `total` is fixed at creation (`subtotal + delivery_charge + platform_fee`)
/// and is never recomputed afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    pub items: Vec<OrderItem>,

    // === Amounts ===
    pub subtotal: Decimal,
    pub delivery_charge: Decimal,
    pub platform_fee: Decimal,
    pub total: Decimal,

    // === Payment ===
    pub payment_method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_proof: Option<PaymentProof>,

    // === Lifecycle ===
    pub status: OrderStatus,
    pub created_at: i64,
    #[serde(default)]
    pub accepted_at: Option<i64>,
    #[serde(default)]
    pub preparation_deadline: Option<i64>,
    #[serde(default)]
    pub ready_at: Option<i64>,
    #[serde(default)]
    pub picked_up_at: Option<i64>,
    #[serde(default)]
    pub delivered_at: Option<i64>,
    #[serde(default)]
    pub cancelled_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,

    // === Assignment ===
    /// 接单骑手（同一时刻最多一个）
    #[serde(default)]
    pub assigned_rider_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_rating: Option<u8>,

    // === Late fee (set once) ===
    #[serde(default)]
    pub late_fee_applied: bool,
    #[serde(default)]
    pub late_fee_amount: Option<Decimal>,

    /// 状态历史
    #[serde(default)]
    pub history: Vec<StatusChange>,
}

impl Order {
    /// Distinct vendor ids in first-appearance order
    pub fn vendor_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for item in &self.items {
            if !ids.contains(&item.vendor_id) {
                ids.push(item.vendor_id.clone());
            }
        }
        ids
    }

    pub fn involves_vendor(&self, vendor_id: &str) -> bool {
        self.items.iter().any(|i| i.vendor_id == vendor_id)
    }

    pub fn is_assigned_to(&self, rider_id: &str) -> bool {
        self.assigned_rider_id.as_deref() == Some(rider_id)
    }

    /// Set status and append a history entry
    pub fn transition(&mut self, status: OrderStatus, at: i64, note: Option<String>) {
        self.status = status;
        self.history.push(StatusChange { status, at, note });
    }
}
