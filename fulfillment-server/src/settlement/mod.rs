//! Earnings settlement
//!
//! - [`engine`]: per-vendor crediting at delivery time (at most once)
//! - [`worker`]: background retry of deferred vendor settlements
//! - [`withdrawal`]: payouts against the vendor/rider ledger

pub mod engine;
pub mod withdrawal;
pub mod worker;

pub use engine::{SettlementEngine, settle_rider};
pub use withdrawal::WithdrawalService;
pub use worker::SettlementWorker;
