//! Order model
//!
//! - [`Order`]: persisted order record
//! - [`types`]: status, payment and item value types
//! - [`request`]: lifecycle operation payloads

pub mod record;
pub mod request;
pub mod types;

// Re-exports
pub use record::Order;
pub use request::*;
pub use types::*;
