//! Settlement records

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Applied vendor settlement, keyed by (order_id, vendor_id)
///
/// Its presence is the guard that a vendor is credited at most once per order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VendorSettlement {
    pub order_id: String,
    pub vendor_id: String,
    pub item_total: Decimal,
    pub commission: Decimal,
    pub vendor_income: Decimal,
    /// Whether income was also credited to the withdrawable wallet
    pub online: bool,
    pub settled_at: i64,
}

/// Vendor settlement owed but not yet applied
///
/// Written with the Delivered transition, removed in the transaction that
/// credits the vendor; anything left behind is retried by the worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingSettlement {
    pub order_id: String,
    pub vendor_id: String,
    /// Retry count
    #[serde(default)]
    pub retry_count: u32,
    /// Last error message
    #[serde(default)]
    pub last_error: Option<String>,
    /// Last attempt timestamp (millis)
    #[serde(default)]
    pub last_attempt_at: Option<i64>,
    pub queued_at: i64,
}

impl PendingSettlement {
    pub fn new(order_id: impl Into<String>, vendor_id: impl Into<String>, error: String, now: i64) -> Self {
        Self {
            order_id: order_id.into(),
            vendor_id: vendor_id.into(),
            retry_count: 0,
            last_error: Some(error),
            last_attempt_at: Some(now),
            queued_at: now,
        }
    }

    /// Credit owed from a delivery that has not been attempted yet
    pub fn owed(order_id: impl Into<String>, vendor_id: impl Into<String>, now: i64) -> Self {
        Self {
            order_id: order_id.into(),
            vendor_id: vendor_id.into(),
            retry_count: 0,
            last_error: None,
            last_attempt_at: None,
            queued_at: now,
        }
    }

    /// Ledger key `order_id:vendor_id`
    pub fn key(&self) -> String {
        settlement_key(&self.order_id, &self.vendor_id)
    }
}

/// Composite key for per-vendor settlement tables
pub fn settlement_key(order_id: &str, vendor_id: &str) -> String {
    format!("{}:{}", order_id, vendor_id)
}
