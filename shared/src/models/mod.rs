//! Data models
//!
//! Shared between fulfillment-server and clients (via API).
//! Money is `rust_decimal::Decimal` (serialized as string), timestamps are
//! Unix milliseconds.

pub mod account;
pub mod product;
pub mod settlement;
pub mod withdrawal;

// Re-exports
pub use account::*;
pub use product::*;
pub use settlement::*;
pub use withdrawal::*;
