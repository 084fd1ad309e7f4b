//! Catalog Product Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Catalog entry, the authoritative price source for CreateOrder
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: String,
    /// Owning vendor
    pub vendor_id: String,
    pub name: String,
    pub price: Decimal,
    pub is_available: bool,
    pub updated_at: i64,
}

/// Upsert product payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductUpsert {
    pub id: String,
    pub vendor_id: String,
    pub name: String,
    pub price: Decimal,
    #[serde(default = "default_available")]
    pub is_available: bool,
}

fn default_available() -> bool {
    true
}
