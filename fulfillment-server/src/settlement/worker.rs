//! Settlement Worker - 商家结算重试
//!
//! 扫描 `pending_settlements` 队列，按指数退避重试失败的商家入账，
//! 超过重试次数的移入死信表；启动时把死信恢复到队列重新尝试。
//!
//! Note: redb operations are synchronous.

use super::engine::SettlementEngine;
use crate::ledger::LedgerStorage;
use shared::models::PendingSettlement;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Retry configuration
const MAX_RETRY_COUNT: u32 = 3;
const RETRY_BASE_DELAY_SECS: u64 = 5;
const RETRY_MAX_DELAY_SECS: u64 = 60; // 1 minute max
const QUEUE_SCAN_INTERVAL_SECS: u64 = 5;

pub struct SettlementWorker {
    storage: LedgerStorage,
    engine: SettlementEngine,
}

impl SettlementWorker {
    pub fn new(storage: LedgerStorage, engine: SettlementEngine) -> Self {
        Self { storage, engine }
    }

    /// Run until the shutdown token is cancelled
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!("SettlementWorker started");

        // Recover dead letter entries back to the pending queue
        match self.storage.recover_settlement_dead_letters() {
            Ok(0) => {}
            Ok(n) => tracing::info!(count = n, "Recovered settlement dead letters to pending queue"),
            Err(e) => tracing::error!(error = %e, "Failed to recover settlement dead letters"),
        }

        let mut scan_interval =
            tokio::time::interval(Duration::from_secs(QUEUE_SCAN_INTERVAL_SECS));

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("SettlementWorker received shutdown signal");
                    break;
                }
                _ = scan_interval.tick() => {
                    self.process_pending_queue();
                }
            }
        }
    }

    /// Process all due entries, returns how many settled
    pub fn process_pending_queue(&self) -> usize {
        self.process_due(shared::util::now_millis())
    }

    /// One scan of the queue as of `now`
    ///
    /// Exhausted entries go to the dead letter table, entries still inside
    /// their backoff window are skipped.
    pub fn process_due(&self, now: i64) -> usize {
        let pending = match self.storage.get_pending_settlements() {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "Failed to get pending settlements");
                return 0;
            }
        };

        if pending.is_empty() {
            return 0;
        }

        tracing::debug!(count = pending.len(), "Processing pending settlement queue");

        let mut settled = 0;
        for entry in pending {
            if entry.retry_count >= MAX_RETRY_COUNT {
                self.dead_letter(&entry);
            } else if retry_due(&entry, now) && self.process_entry(&entry) {
                settled += 1;
            }
        }
        settled
    }

    fn dead_letter(&self, entry: &PendingSettlement) {
        tracing::error!(
            order_id = %entry.order_id,
            vendor_id = %entry.vendor_id,
            retry_count = entry.retry_count,
            last_error = ?entry.last_error,
            "Max retry count exceeded, moving settlement to dead letter queue"
        );
        let error = entry.last_error.as_deref().unwrap_or("Unknown error");
        if let Err(e) = self.storage.move_settlement_to_dead_letter(&entry.key(), error) {
            tracing::error!(key = %entry.key(), error = %e, "Failed to move settlement to dead letter");
        }
    }

    fn process_entry(&self, entry: &PendingSettlement) -> bool {
        match self.engine.retry_pending(entry) {
            Ok(applied) => {
                tracing::info!(
                    order_id = %entry.order_id,
                    vendor_id = %entry.vendor_id,
                    applied,
                    "Deferred vendor settlement resolved"
                );
                true
            }
            Err(e) => {
                tracing::warn!(order_id = %entry.order_id, vendor_id = %entry.vendor_id, error = %e, "Settlement retry failed");
                if let Err(e2) = self.storage.mark_settlement_failed(&entry.key(), &e.to_string()) {
                    tracing::error!(key = %entry.key(), error = %e2, "Failed to mark settlement failed");
                }
                false
            }
        }
    }
}

/// Whether the entry's backoff window has elapsed at `now`
///
/// delay = base × 2^retry_count, capped at [`RETRY_MAX_DELAY_SECS`],
/// counted from the last attempt (or from queueing).
fn retry_due(entry: &PendingSettlement, now: i64) -> bool {
    let delay_secs = RETRY_BASE_DELAY_SECS
        .saturating_mul(2u64.saturating_pow(entry.retry_count))
        .min(RETRY_MAX_DELAY_SECS);
    let last = entry.last_attempt_at.unwrap_or(entry.queued_at);
    now >= last + (delay_secs as i64 * 1000)
}
