//! Order lifecycle
//!
//! - **manager**: [`OrdersManager`], the order status state machine
//! - **money**: pricing, commission and fee arithmetic
//!
//! # Architecture
//!
//! ```text
//! HTTP handler → OrdersManager ──► LedgerStorage (redb, one txn per transition)
//!                    │
//!                    ├─► PreparationDeadlineMonitor (arm / disarm)
//!                    ├─► AssignmentBroker (ready broadcast, claims)
//!                    ├─► SettlementEngine (on Delivered)
//!                    └─► NotificationSink (every transition)
//! ```

pub mod manager;
pub mod money;

// Re-exports
pub use manager::OrdersManager;
pub use shared::order::{Order, OrderStatus};
