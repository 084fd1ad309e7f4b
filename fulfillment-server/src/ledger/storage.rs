//! redb-based ledger for orders, accounts and money movements
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `order_id` | `Order` | Order records |
//! | `accounts` | `account_id` | `Account` | Customers, vendors, riders, admins |
//! | `products` | `product_id` | `Product` | Authoritative catalog prices |
//! | `withdrawals` | `withdrawal_id` | `Withdrawal` | Payout records |
//! | `vendor_settlements` | `order_id:vendor_id` | `VendorSettlement` | Applied vendor credit (at most once) |
//! | `pending_settlements` | `order_id:vendor_id` | `PendingSettlement` | Vendor credit retry queue |
//! | `settlement_dead_letter` | `order_id:vendor_id` | `SettlementDeadLetter` | Exhausted retries |
//! | `deadlines` | `order_id` | `i64` | Armed preparation deadlines (millis) |
//! | `consumed_payments` | `payment_id` | `order_id` | Provider payments already backing an order |
//!
//! # Conditional updates
//!
//! redb serialises write transactions. Every compare-and-swap is
//! read → check → write → commit inside one `WriteTransaction`, so the check
//! cannot interleave with another writer. Records touched together (order +
//! rider on claim/delivery) are committed in the same transaction.

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use shared::models::{
    Account, PendingSettlement, Product, RiderProfile, VendorSettlement, Withdrawal,
    settlement_key,
};
use shared::order::{Order, OrderStatus};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");

const ACCOUNTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("accounts");

const PRODUCTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("products");

const WITHDRAWALS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("withdrawals");

/// key = `order_id:vendor_id`, presence means the vendor was credited
const VENDOR_SETTLEMENTS_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("vendor_settlements");

const PENDING_SETTLEMENTS_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("pending_settlements");

const SETTLEMENT_DEAD_LETTER_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("settlement_dead_letter");

/// key = order_id, value = preparation deadline (millis)
const DEADLINES_TABLE: TableDefinition<&str, i64> = TableDefinition::new("deadlines");

/// key = provider payment_id, value = order_id it paid for
const CONSUMED_PAYMENTS_TABLE: TableDefinition<&str, &str> =
    TableDefinition::new("consumed_payments");

/// Dead letter entry (vendor settlement that exhausted its retries)
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SettlementDeadLetter {
    pub order_id: String,
    pub vendor_id: String,
    pub queued_at: i64,
    pub failed_at: i64,
    pub retry_count: u32,
    pub last_error: String,
}

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Ledger storage backed by redb
#[derive(Clone)]
pub struct LedgerStorage {
    db: Arc<Database>,
}

impl std::fmt::Debug for LedgerStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerStorage").finish_non_exhaustive()
    }
}

impl LedgerStorage {
    /// Open or create the ledger at the given path
    ///
    /// redb commits with `Durability::Immediate`: a commit is persistent as
    /// soon as `commit()` returns and the file is always consistent.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory ledger (tests)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            // Create all tables if they don't exist
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(ACCOUNTS_TABLE)?;
            let _ = write_txn.open_table(PRODUCTS_TABLE)?;
            let _ = write_txn.open_table(WITHDRAWALS_TABLE)?;
            let _ = write_txn.open_table(VENDOR_SETTLEMENTS_TABLE)?;
            let _ = write_txn.open_table(PENDING_SETTLEMENTS_TABLE)?;
            let _ = write_txn.open_table(SETTLEMENT_DEAD_LETTER_TABLE)?;
            let _ = write_txn.open_table(DEADLINES_TABLE)?;
            let _ = write_txn.open_table(CONSUMED_PAYMENTS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    // ========== Orders ==========

    pub fn put_order(&self, txn: &WriteTransaction, order: &Order) -> StorageResult<()> {
        let mut table = txn.open_table(ORDERS_TABLE)?;
        let value = serde_json::to_vec(order)?;
        table.insert(order.id.as_str(), value.as_slice())?;
        Ok(())
    }

    /// Read an order inside a write transaction (for conditional updates)
    pub fn get_order_txn(&self, txn: &WriteTransaction, order_id: &str) -> StorageResult<Option<Order>> {
        let table = txn.open_table(ORDERS_TABLE)?;
        match table.get(order_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_order(&self, order_id: &str) -> StorageResult<Option<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        match table.get(order_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// All orders, optionally filtered by status, oldest first
    pub fn list_orders(&self, status: Option<OrderStatus>) -> StorageResult<Vec<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;

        let mut orders = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            let order: Order = serde_json::from_slice(value.value())?;
            if status.is_none_or(|s| s == order.status) {
                orders.push(order);
            }
        }
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    // ========== Accounts ==========

    pub fn put_account(&self, txn: &WriteTransaction, account: &Account) -> StorageResult<()> {
        let mut table = txn.open_table(ACCOUNTS_TABLE)?;
        let value = serde_json::to_vec(account)?;
        table.insert(account.id(), value.as_slice())?;
        Ok(())
    }

    pub fn get_account_txn(
        &self,
        txn: &WriteTransaction,
        account_id: &str,
    ) -> StorageResult<Option<Account>> {
        let table = txn.open_table(ACCOUNTS_TABLE)?;
        match table.get(account_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_account(&self, account_id: &str) -> StorageResult<Option<Account>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACCOUNTS_TABLE)?;
        match table.get(account_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// All rider profiles
    pub fn list_riders(&self) -> StorageResult<Vec<RiderProfile>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACCOUNTS_TABLE)?;

        let mut riders = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            let account: Account = serde_json::from_slice(value.value())?;
            if let Account::Rider(rider) = account {
                riders.push(rider);
            }
        }
        Ok(riders)
    }

    // ========== Products ==========

    pub fn put_product(&self, txn: &WriteTransaction, product: &Product) -> StorageResult<()> {
        let mut table = txn.open_table(PRODUCTS_TABLE)?;
        let value = serde_json::to_vec(product)?;
        table.insert(product.id.as_str(), value.as_slice())?;
        Ok(())
    }

    pub fn get_product(&self, product_id: &str) -> StorageResult<Option<Product>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PRODUCTS_TABLE)?;
        match table.get(product_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    // ========== Withdrawals ==========

    pub fn put_withdrawal(&self, txn: &WriteTransaction, withdrawal: &Withdrawal) -> StorageResult<()> {
        let mut table = txn.open_table(WITHDRAWALS_TABLE)?;
        let value = serde_json::to_vec(withdrawal)?;
        table.insert(withdrawal.id.as_str(), value.as_slice())?;
        Ok(())
    }

    pub fn get_withdrawal_txn(
        &self,
        txn: &WriteTransaction,
        withdrawal_id: &str,
    ) -> StorageResult<Option<Withdrawal>> {
        let table = txn.open_table(WITHDRAWALS_TABLE)?;
        match table.get(withdrawal_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Withdrawals, optionally for one account, newest first
    pub fn list_withdrawals(&self, account_id: Option<&str>) -> StorageResult<Vec<Withdrawal>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(WITHDRAWALS_TABLE)?;

        let mut withdrawals = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            let withdrawal: Withdrawal = serde_json::from_slice(value.value())?;
            if account_id.is_none_or(|id| id == withdrawal.account_id) {
                withdrawals.push(withdrawal);
            }
        }
        withdrawals.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(withdrawals)
    }

    // ========== Vendor Settlements ==========

    pub fn has_vendor_settlement_txn(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
        vendor_id: &str,
    ) -> StorageResult<bool> {
        let table = txn.open_table(VENDOR_SETTLEMENTS_TABLE)?;
        Ok(table.get(settlement_key(order_id, vendor_id).as_str())?.is_some())
    }

    pub fn put_vendor_settlement(
        &self,
        txn: &WriteTransaction,
        settlement: &VendorSettlement,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(VENDOR_SETTLEMENTS_TABLE)?;
        let key = settlement_key(&settlement.order_id, &settlement.vendor_id);
        let value = serde_json::to_vec(settlement)?;
        table.insert(key.as_str(), value.as_slice())?;
        Ok(())
    }

    pub fn get_vendor_settlement(
        &self,
        order_id: &str,
        vendor_id: &str,
    ) -> StorageResult<Option<VendorSettlement>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(VENDOR_SETTLEMENTS_TABLE)?;
        match table.get(settlement_key(order_id, vendor_id).as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    // ========== Pending Settlement Queue ==========

    /// Queue a deferred vendor settlement (own transaction)
    pub fn queue_settlement(&self, pending: &PendingSettlement) -> StorageResult<()> {
        let txn = self.begin_write()?;
        self.queue_settlement_txn(&txn, pending)?;
        txn.commit()?;
        Ok(())
    }

    /// Queue within the caller's transaction (delivery writes the owed
    /// vendor credits together with the Delivered status)
    pub fn queue_settlement_txn(
        &self,
        txn: &WriteTransaction,
        pending: &PendingSettlement,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(PENDING_SETTLEMENTS_TABLE)?;
        let value = serde_json::to_vec(pending)?;
        table.insert(pending.key().as_str(), value.as_slice())?;
        Ok(())
    }

    /// Remove a queue entry within a settlement transaction
    pub fn remove_pending_settlement(&self, txn: &WriteTransaction, key: &str) -> StorageResult<()> {
        let mut table = txn.open_table(PENDING_SETTLEMENTS_TABLE)?;
        table.remove(key)?;
        Ok(())
    }

    pub fn get_pending_settlements(&self) -> StorageResult<Vec<PendingSettlement>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PENDING_SETTLEMENTS_TABLE)?;

        let mut entries = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            let pending: PendingSettlement = serde_json::from_slice(value.value())?;
            entries.push(pending);
        }
        Ok(entries)
    }

    /// Record a failed retry, increment retry count
    pub fn mark_settlement_failed(&self, key: &str, error: &str) -> StorageResult<()> {
        let txn = self.begin_write()?;
        {
            let mut table = txn.open_table(PENDING_SETTLEMENTS_TABLE)?;

            // Read and clone first to avoid borrow conflict
            let pending_opt = if let Some(value) = table.get(key)? {
                let pending: PendingSettlement = serde_json::from_slice(value.value())?;
                Some(pending)
            } else {
                None
            };

            if let Some(mut pending) = pending_opt {
                pending.retry_count += 1;
                pending.last_error = Some(error.to_string());
                pending.last_attempt_at = Some(shared::util::now_millis());
                let new_value = serde_json::to_vec(&pending)?;
                table.insert(key, new_value.as_slice())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Move an entry from the retry queue to the dead letter table
    pub fn move_settlement_to_dead_letter(&self, key: &str, error: &str) -> StorageResult<()> {
        let txn = self.begin_write()?;
        {
            let mut pending_table = txn.open_table(PENDING_SETTLEMENTS_TABLE)?;
            let mut dead_letter_table = txn.open_table(SETTLEMENT_DEAD_LETTER_TABLE)?;

            let pending_opt = if let Some(value) = pending_table.get(key)? {
                let pending: PendingSettlement = serde_json::from_slice(value.value())?;
                Some(pending)
            } else {
                None
            };

            if let Some(pending) = pending_opt {
                let dead_letter = SettlementDeadLetter {
                    order_id: pending.order_id.clone(),
                    vendor_id: pending.vendor_id.clone(),
                    queued_at: pending.queued_at,
                    failed_at: shared::util::now_millis(),
                    retry_count: pending.retry_count,
                    last_error: error.to_string(),
                };
                let value = serde_json::to_vec(&dead_letter)?;
                dead_letter_table.insert(key, value.as_slice())?;
                pending_table.remove(key)?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_settlement_dead_letters(&self) -> StorageResult<Vec<SettlementDeadLetter>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SETTLEMENT_DEAD_LETTER_TABLE)?;

        let mut entries = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            let entry: SettlementDeadLetter = serde_json::from_slice(value.value())?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Move all dead letters back to the retry queue (reset retry count)
    ///
    /// Used at startup so settlements that failed before a fix get retried.
    pub fn recover_settlement_dead_letters(&self) -> StorageResult<usize> {
        let txn = self.begin_write()?;
        let count = {
            let mut pending_table = txn.open_table(PENDING_SETTLEMENTS_TABLE)?;
            let mut dead_letter_table = txn.open_table(SETTLEMENT_DEAD_LETTER_TABLE)?;

            // Collect first (can't iterate and mutate simultaneously)
            let mut dead = Vec::new();
            for result in dead_letter_table.iter()? {
                let (key, value) = result?;
                let entry: SettlementDeadLetter = serde_json::from_slice(value.value())?;
                dead.push((key.value().to_string(), entry));
            }

            let now = shared::util::now_millis();
            for (key, entry) in &dead {
                let pending = PendingSettlement {
                    order_id: entry.order_id.clone(),
                    vendor_id: entry.vendor_id.clone(),
                    retry_count: 0,
                    last_error: Some(entry.last_error.clone()),
                    last_attempt_at: None,
                    queued_at: now,
                };
                let value = serde_json::to_vec(&pending)?;
                pending_table.insert(key.as_str(), value.as_slice())?;
                dead_letter_table.remove(key.as_str())?;
            }
            dead.len()
        };
        txn.commit()?;
        Ok(count)
    }

    // ========== Deadline Index ==========

    pub fn put_deadline(&self, txn: &WriteTransaction, order_id: &str, deadline: i64) -> StorageResult<()> {
        let mut table = txn.open_table(DEADLINES_TABLE)?;
        table.insert(order_id, deadline)?;
        Ok(())
    }

    pub fn remove_deadline(&self, txn: &WriteTransaction, order_id: &str) -> StorageResult<()> {
        let mut table = txn.open_table(DEADLINES_TABLE)?;
        table.remove(order_id)?;
        Ok(())
    }

    /// All armed deadlines as (order_id, deadline_millis)
    pub fn get_deadlines(&self) -> StorageResult<Vec<(String, i64)>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DEADLINES_TABLE)?;

        let mut entries = Vec::new();
        for result in table.iter()? {
            let (key, value) = result?;
            entries.push((key.value().to_string(), value.value()));
        }
        Ok(entries)
    }

    // ========== Consumed Payments ==========

    /// Order already paid for by this provider payment, if any
    pub fn payment_consumed_by_txn(
        &self,
        txn: &WriteTransaction,
        payment_id: &str,
    ) -> StorageResult<Option<String>> {
        let table = txn.open_table(CONSUMED_PAYMENTS_TABLE)?;
        Ok(table.get(payment_id)?.map(|v| v.value().to_string()))
    }

    pub fn consume_payment(
        &self,
        txn: &WriteTransaction,
        payment_id: &str,
        order_id: &str,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(CONSUMED_PAYMENTS_TABLE)?;
        table.insert(payment_id, order_id)?;
        Ok(())
    }

    // ========== Statistics ==========

    pub fn get_stats(&self) -> StorageResult<LedgerStats> {
        let read_txn = self.db.begin_read()?;

        let orders_table = read_txn.open_table(ORDERS_TABLE)?;
        let accounts_table = read_txn.open_table(ACCOUNTS_TABLE)?;
        let pending_table = read_txn.open_table(PENDING_SETTLEMENTS_TABLE)?;
        let dead_letter_table = read_txn.open_table(SETTLEMENT_DEAD_LETTER_TABLE)?;
        let deadlines_table = read_txn.open_table(DEADLINES_TABLE)?;

        Ok(LedgerStats {
            order_count: orders_table.len()?,
            account_count: accounts_table.len()?,
            pending_settlement_count: pending_table.len()?,
            dead_letter_count: dead_letter_table.len()?,
            armed_deadline_count: deadlines_table.len()?,
        })
    }
}

/// Ledger statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct LedgerStats {
    pub order_count: u64,
    pub account_count: u64,
    pub pending_settlement_count: u64,
    pub dead_letter_count: u64,
    pub armed_deadline_count: u64,
}
