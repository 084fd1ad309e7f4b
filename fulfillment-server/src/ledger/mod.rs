//! Ledger Store
//!
//! Durable storage for orders, accounts, catalog, withdrawals and settlement
//! bookkeeping. See [`storage`] for the table layout.

pub mod storage;

pub use storage::{LedgerStats, LedgerStorage, SettlementDeadLetter, StorageError, StorageResult};
