//! Shared types for the fulfillment service
//!
//! Wire and persisted types used by the server and its clients: error codes,
//! order records, accounts, withdrawals, settlement records and lifecycle
//! notifications.

pub mod error;
pub mod message;
pub mod models;
pub mod order;
pub mod util;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};

pub use message::{Channel, LifecycleEvent, Notification};
