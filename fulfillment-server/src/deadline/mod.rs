//! Preparation Deadline Monitor
//!
//! 订单进入 Confirmed 时为其挂一个一次性定时器，到点仍未出餐（状态仍在
//! Confirmed / Preparing）则按订单小计收取 10% 超时费，按菜品金额拆给各商家。
//!
//! - 定时器注册表：`DashMap<order_id, CancellationToken>`，离开窗口即撤销
//! - 持久化索引：`deadlines` 表在确认事务中写入，离开窗口或收费后删除
//! - 重启恢复：[`PreparationDeadlineMonitor::restore`] 按持久化的截止时间
//!   重算剩余延迟，过期的立即触发
//! - 触发处理是幂等的条件更新，重复触发只会收费一次

use crate::accounts::vendor_txn;
use crate::core::error::{FulfillmentError, FulfillmentResult};
use crate::ledger::LedgerStorage;
use crate::notify::NotificationSink;
use crate::orders::money::{split_late_fee, vendor_item_totals};
use dashmap::DashMap;
use rust_decimal::Decimal;
use shared::message::{Channel, LifecycleEvent};
use shared::models::Account;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// 出餐时限（毫秒）
pub const PREPARATION_WINDOW_MS: i64 = 30 * 60 * 1000;

#[derive(Clone)]
pub struct PreparationDeadlineMonitor {
    storage: LedgerStorage,
    sink: Arc<dyn NotificationSink>,
    timers: Arc<DashMap<String, CancellationToken>>,
    /// Parent of every timer token
    shutdown: CancellationToken,
}

impl std::fmt::Debug for PreparationDeadlineMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparationDeadlineMonitor")
            .field("armed", &self.timers.len())
            .finish()
    }
}

impl PreparationDeadlineMonitor {
    pub fn new(storage: LedgerStorage, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            storage,
            sink,
            timers: Arc::new(DashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Tie timers to the server shutdown token
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Arm a one-shot timer firing at `deadline` (millis)
    ///
    /// Outside a tokio runtime nothing is spawned; the persisted deadline
    /// index still lets [`restore`](Self::restore) pick it up.
    pub fn arm(&self, order_id: &str, deadline: i64) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(h) => h,
            Err(_) => {
                tracing::warn!(order_id = %order_id, "No runtime available, deadline timer not armed");
                return;
            }
        };

        let delay_ms = (deadline - shared::util::now_millis()).max(0) as u64;
        let token = self.shutdown.child_token();
        if let Some(previous) = self.timers.insert(order_id.to_string(), token.clone()) {
            previous.cancel();
        }

        tracing::debug!(order_id = %order_id, delay_ms, "Preparation deadline armed");

        let monitor = self.clone();
        let order_id = order_id.to_string();
        handle.spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    tracing::trace!(order_id = %order_id, "Deadline timer cancelled");
                }
                _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => {
                    monitor.timers.remove(&order_id);
                    if let Err(e) = monitor.apply_late_fee(&order_id) {
                        // 索引保留，重启后 restore 会再次触发
                        tracing::error!(order_id = %order_id, error = %e, "Failed to apply late fee");
                    }
                }
            }
        });
    }

    /// Cancel the timer for an order (no-op if none)
    pub fn disarm(&self, order_id: &str) {
        if let Some((_, token)) = self.timers.remove(order_id) {
            token.cancel();
            tracing::debug!(order_id = %order_id, "Preparation deadline disarmed");
        }
    }

    pub fn armed_count(&self) -> usize {
        self.timers.len()
    }

    pub fn is_armed(&self, order_id: &str) -> bool {
        self.timers.contains_key(order_id)
    }

    /// Re-arm every persisted deadline after a restart
    ///
    /// 剩余延迟 = max(0, preparation_deadline - now)。
    /// 已离开窗口的订单只清理索引。
    pub fn restore(&self) -> FulfillmentResult<usize> {
        let deadlines = self.storage.get_deadlines()?;
        let mut armed = 0;

        for (order_id, deadline) in deadlines {
            let eligible = match self.storage.get_order(&order_id)? {
                Some(order) => {
                    order.status.is_preparing_window()
                        && order.ready_at.is_none()
                        && !order.late_fee_applied
                }
                None => false,
            };

            if eligible {
                self.arm(&order_id, deadline);
                armed += 1;
            } else {
                let txn = self.storage.begin_write()?;
                self.storage.remove_deadline(&txn, &order_id)?;
                txn.commit()?;
                tracing::debug!(order_id = %order_id, "Dropped stale deadline index entry");
            }
        }

        tracing::info!(armed, "Preparation deadlines restored");
        Ok(armed)
    }

    /// Fire handler: charge the late fee once
    ///
    /// Returns the total fee when it was applied now, `None` when the order
    /// had already left the preparation window or was already charged.
    pub fn apply_late_fee(&self, order_id: &str) -> FulfillmentResult<Option<Decimal>> {
        let txn = self.storage.begin_write()?;
        let mut order = self
            .storage
            .get_order_txn(&txn, order_id)?
            .ok_or_else(|| FulfillmentError::OrderNotFound(order_id.to_string()))?;

        if !order.status.is_preparing_window() || order.ready_at.is_some() || order.late_fee_applied {
            self.storage.remove_deadline(&txn, order_id)?;
            txn.commit()?;
            tracing::debug!(order_id = %order_id, status = %order.status, "Deadline fired outside preparation window, ignored");
            return Ok(None);
        }

        // 整单算一次费用，再按菜品金额拆给各商家
        let (total_fee, charges) =
            split_late_fee(order.subtotal, &vendor_item_totals(&order.items));
        for (vendor_id, fee) in &charges {
            let mut vendor = vendor_txn(&self.storage, &txn, vendor_id)?;
            // 可透支：余额不足时记为负数
            vendor.wallet.wallet_balance -= *fee;
            vendor.wallet.total_late_fees += *fee;
            self.storage.put_account(&txn, &Account::Vendor(vendor))?;
        }

        order.late_fee_applied = true;
        order.late_fee_amount = Some(total_fee);
        self.storage.put_order(&txn, &order)?;
        self.storage.remove_deadline(&txn, order_id)?;
        txn.commit()?;

        tracing::warn!(order_id = %order_id, late_fee = %total_fee, "Preparation deadline missed, late fee applied");

        for (vendor_id, amount) in charges {
            let event = LifecycleEvent::LateFeeApplied {
                order_id: order_id.to_string(),
                vendor_id: vendor_id.clone(),
                amount,
            };
            self.sink
                .publish_many(vec![Channel::Vendor(vendor_id), Channel::Admin], event);
        }

        Ok(Some(total_fee))
    }
}
