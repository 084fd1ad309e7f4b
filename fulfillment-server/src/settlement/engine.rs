//! Settlement Engine
//!
//! 配送完成时的结算：
//!
//! 1. 骑手：固定配送费、配送次数、评分滑动平均、释放骑手。由
//!    `OrdersManager::deliver_order` 在标记 Delivered 的同一事务中调用
//!    [`settle_rider`]，因此只会发生一次。
//! 2. 商家：标记 Delivered 的事务同时为每个商家写入一条
//!    `pending_settlements` 应付记录，之后每个商家一个独立事务入账并删除
//!    该记录；`vendor_settlements` 表中的 `(order_id, vendor_id)` 记录保证
//!    每个商家最多入账一次。入账失败或进程在入账前退出，应付记录都留在队列
//!    中由 [`SettlementWorker`] 重试。
//!
//! [`SettlementWorker`]: super::worker::SettlementWorker

use crate::accounts::vendor_txn;
use crate::core::error::{FulfillmentError, FulfillmentResult};
use crate::ledger::LedgerStorage;
use crate::notify::NotificationSink;
use crate::orders::money::{RIDER_DELIVERY_FEE, running_average, vendor_item_totals, vendor_split};
use rust_decimal::Decimal;
use shared::message::{Channel, LifecycleEvent};
use shared::models::{Account, PendingSettlement, RiderProfile, VendorSettlement, settlement_key};
use shared::order::{Order, RiderOrderStatus, VendorSettlementResult};
use shared::util::now_millis;
use std::sync::Arc;

/// Credit the rider for a delivery and free them
///
/// Pure mutation; the caller commits it with the Delivered transition.
/// Returns the fee credited.
pub fn settle_rider(rider: &mut RiderProfile, rating: Option<u8>) -> Decimal {
    rider.total_earnings += RIDER_DELIVERY_FEE;
    rider.wallet_balance += RIDER_DELIVERY_FEE;
    rider.total_deliveries += 1;
    if let Some(rating) = rating {
        rider.average_rating = running_average(rider.average_rating, rider.total_deliveries, rating);
    }
    rider.current_order_id = None;
    rider.current_order_status = Some(RiderOrderStatus::Delivered);
    rider.is_available = true;
    RIDER_DELIVERY_FEE
}

#[derive(Clone)]
pub struct SettlementEngine {
    storage: LedgerStorage,
    sink: Arc<dyn NotificationSink>,
}

impl std::fmt::Debug for SettlementEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementEngine").finish_non_exhaustive()
    }
}

impl SettlementEngine {
    pub fn new(storage: LedgerStorage, sink: Arc<dyn NotificationSink>) -> Self {
        Self { storage, sink }
    }

    /// Settle every vendor of a delivered order
    ///
    /// Never fails: vendor-side errors are queued for retry and reported as
    /// [`VendorSettlementResult::Deferred`].
    pub fn settle_vendors(&self, order: &Order) -> Vec<VendorSettlementResult> {
        let mut results = Vec::new();

        for (vendor_id, item_total) in vendor_item_totals(&order.items) {
            let split = vendor_split(item_total);
            match self.settle_vendor(order, &vendor_id, item_total) {
                Ok(_) => results.push(VendorSettlementResult::Applied {
                    vendor_id,
                    vendor_income: split.vendor_income,
                }),
                Err(e) => {
                    let error = e.to_string();
                    tracing::error!(
                        order_id = %order.id,
                        vendor_id = %vendor_id,
                        error = %error,
                        "Vendor settlement failed, queued for retry"
                    );
                    let pending =
                        PendingSettlement::new(&order.id, &vendor_id, error.clone(), now_millis());
                    if let Err(qe) = self.storage.queue_settlement(&pending) {
                        tracing::error!(order_id = %order.id, vendor_id = %vendor_id, error = %qe, "Failed to queue pending settlement");
                    }
                    self.sink.publish(
                        Channel::Admin,
                        LifecycleEvent::VendorSettlementDeferred {
                            order_id: order.id.clone(),
                            vendor_id: vendor_id.clone(),
                            error: error.clone(),
                        },
                    );
                    results.push(VendorSettlementResult::Deferred { vendor_id, error });
                }
            }
        }

        results
    }

    /// Credit one vendor for one order in its own transaction
    ///
    /// Returns `Ok(false)` when the vendor had already been credited. Any
    /// queue entry for the pair is removed in the same transaction.
    pub fn settle_vendor(
        &self,
        order: &Order,
        vendor_id: &str,
        item_total: Decimal,
    ) -> FulfillmentResult<bool> {
        let key = settlement_key(&order.id, vendor_id);
        let txn = self.storage.begin_write()?;

        if self.storage.has_vendor_settlement_txn(&txn, &order.id, vendor_id)? {
            self.storage.remove_pending_settlement(&txn, &key)?;
            txn.commit()?;
            tracing::debug!(order_id = %order.id, vendor_id = %vendor_id, "Vendor already settled");
            return Ok(false);
        }

        let split = vendor_split(item_total);
        let online = order.payment_method.is_online();
        let mut vendor = vendor_txn(&self.storage, &txn, vendor_id)?;

        vendor.wallet.total_earnings += split.vendor_income;
        // 现金订单由商家线下收款，不进入可提现余额
        if online {
            vendor.wallet.wallet_balance += split.vendor_income;
            vendor.wallet.online_earnings += split.vendor_income;
        }

        let record = VendorSettlement {
            order_id: order.id.clone(),
            vendor_id: vendor_id.to_string(),
            item_total: split.item_total,
            commission: split.commission,
            vendor_income: split.vendor_income,
            online,
            settled_at: now_millis(),
        };

        self.storage.put_account(&txn, &Account::Vendor(vendor))?;
        self.storage.put_vendor_settlement(&txn, &record)?;
        self.storage.remove_pending_settlement(&txn, &key)?;
        txn.commit()?;

        tracing::info!(
            order_id = %order.id,
            vendor_id = %vendor_id,
            vendor_income = %split.vendor_income,
            commission = %split.commission,
            online,
            "Vendor settled"
        );
        Ok(true)
    }

    /// Retry a queued settlement (worker path)
    pub fn retry_pending(&self, pending: &PendingSettlement) -> FulfillmentResult<bool> {
        let order = self
            .storage
            .get_order(&pending.order_id)?
            .ok_or_else(|| FulfillmentError::OrderNotFound(pending.order_id.clone()))?;

        let item_total = vendor_item_totals(&order.items)
            .into_iter()
            .find(|(v, _)| v == &pending.vendor_id)
            .map(|(_, total)| total)
            .ok_or_else(|| FulfillmentError::NotOrderVendor {
                order_id: order.id.clone(),
                vendor_id: pending.vendor_id.clone(),
            })?;

        self.settle_vendor(&order, &pending.vendor_id, item_total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingSink;
    use shared::models::{CustomerProfile, VendorProfile, VendorWallet};
    use shared::order::{OrderItem, OrderStatus, PaymentMethod};

    fn rider() -> RiderProfile {
        RiderProfile {
            id: "r1".into(),
            name: "Ravi".into(),
            is_online: true,
            is_available: false,
            current_order_id: Some("o1".into()),
            current_order_status: Some(RiderOrderStatus::PickedUp),
            wallet_balance: Decimal::ZERO,
            total_earnings: Decimal::ZERO,
            total_withdrawn: Decimal::ZERO,
            total_deliveries: 0,
            total_cancellations: 0,
            average_rating: 5.0,
            bank: None,
            created_at: 0,
        }
    }

    fn seed_vendor(storage: &LedgerStorage, id: &str) {
        let txn = storage.begin_write().unwrap();
        storage
            .put_account(
                &txn,
                &Account::Vendor(VendorProfile {
                    id: id.into(),
                    name: id.into(),
                    is_online: true,
                    wallet: VendorWallet::default(),
                    bank: None,
                    created_at: 0,
                }),
            )
            .unwrap();
        txn.commit().unwrap();
    }

    fn delivered_order(payment_method: PaymentMethod, items: Vec<OrderItem>) -> Order {
        let subtotal: Decimal = items.iter().map(|i| i.line_total()).sum();
        Order {
            id: "o1".into(),
            customer_id: "c1".into(),
            items,
            subtotal,
            delivery_charge: Decimal::from(40),
            platform_fee: Decimal::from(4),
            total: subtotal + Decimal::from(44),
            payment_method,
            payment_proof: None,
            status: OrderStatus::Delivered,
            created_at: 0,
            accepted_at: None,
            preparation_deadline: None,
            ready_at: None,
            picked_up_at: None,
            delivered_at: Some(1),
            cancelled_at: None,
            cancel_reason: None,
            assigned_rider_id: Some("r1".into()),
            delivery_rating: None,
            late_fee_applied: false,
            late_fee_amount: None,
            history: vec![],
        }
    }

    fn item(vendor_id: &str, price: i64, quantity: u32) -> OrderItem {
        OrderItem {
            product_id: format!("p-{}", vendor_id),
            vendor_id: vendor_id.into(),
            name: "Biryani".into(),
            unit_price: Decimal::from(price),
            quantity,
        }
    }

    fn wallet(storage: &LedgerStorage, id: &str) -> VendorWallet {
        storage.get_account(id).unwrap().unwrap().as_vendor().unwrap().wallet.clone()
    }

    #[test]
    fn test_settle_rider_running_average() {
        let mut r = rider();
        assert_eq!(settle_rider(&mut r, Some(3)), Decimal::from(40));
        assert_eq!(r.average_rating, 3.0);
        assert_eq!(r.total_deliveries, 1);
        assert!(r.is_available);
        assert!(r.current_order_id.is_none());
        assert_eq!(r.current_order_status, Some(RiderOrderStatus::Delivered));

        settle_rider(&mut r, Some(5));
        assert_eq!(r.average_rating, 4.0);
        assert_eq!(r.total_earnings, Decimal::from(80));
        assert_eq!(r.wallet_balance, Decimal::from(80));

        // 无评分不影响平均分
        settle_rider(&mut r, None);
        assert_eq!(r.average_rating, 4.0);
        assert_eq!(r.total_deliveries, 3);
    }

    #[test]
    fn test_online_vendor_settlement_credits_wallet_once() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        let engine = SettlementEngine::new(storage.clone(), Arc::new(RecordingSink::new()));
        seed_vendor(&storage, "v1");
        let order = delivered_order(PaymentMethod::OnlinePrepaid, vec![item("v1", 100, 2)]);

        let results = engine.settle_vendors(&order);
        assert_eq!(
            results,
            vec![VendorSettlementResult::Applied {
                vendor_id: "v1".into(),
                vendor_income: Decimal::from(196),
            }]
        );
        assert!(!engine.settle_vendor(&order, "v1", Decimal::from(200)).unwrap());

        let w = wallet(&storage, "v1");
        assert_eq!(w.total_earnings, Decimal::from(196));
        assert_eq!(w.wallet_balance, Decimal::from(196));
        assert_eq!(w.online_earnings, Decimal::from(196));

        let record = storage.get_vendor_settlement("o1", "v1").unwrap().unwrap();
        assert_eq!(record.commission, Decimal::from(4));
        assert!(record.online);
    }

    #[test]
    fn test_cash_settlement_leaves_wallet_balance() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        let engine = SettlementEngine::new(storage.clone(), Arc::new(RecordingSink::new()));
        seed_vendor(&storage, "v1");
        let order = delivered_order(PaymentMethod::CashOnDelivery, vec![item("v1", 50, 3)]);

        engine.settle_vendors(&order);
        let w = wallet(&storage, "v1");
        assert_eq!(w.total_earnings, Decimal::from(147));
        assert_eq!(w.wallet_balance, Decimal::ZERO);
        assert_eq!(w.online_earnings, Decimal::ZERO);
    }

    #[test]
    fn test_vendor_failure_is_deferred_not_fatal() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        let sink = Arc::new(RecordingSink::new());
        let engine = SettlementEngine::new(storage.clone(), sink.clone());
        seed_vendor(&storage, "v1");
        // v2 被改成了顾客账号，结算必然失败
        let txn = storage.begin_write().unwrap();
        storage
            .put_account(
                &txn,
                &Account::Customer(CustomerProfile {
                    id: "v2".into(),
                    name: "not a vendor".into(),
                    email: "x@example.com".into(),
                    created_at: 0,
                }),
            )
            .unwrap();
        txn.commit().unwrap();

        let order = delivered_order(
            PaymentMethod::OnlinePrepaid,
            vec![item("v1", 100, 1), item("v2", 100, 1)],
        );
        let results = engine.settle_vendors(&order);
        assert!(results[0].is_applied());
        assert!(!results[1].is_applied());
        assert_eq!(results[1].vendor_id(), "v2");

        let pending = storage.get_pending_settlements().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].key(), "o1:v2");
        assert_eq!(sink.count("vendor_settlement_deferred"), 1);
        assert_eq!(wallet(&storage, "v1").total_earnings, Decimal::from(98));
    }

    #[test]
    fn test_retry_pending_clears_queue() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        let engine = SettlementEngine::new(storage.clone(), Arc::new(RecordingSink::new()));
        let order = delivered_order(PaymentMethod::OnlinePrepaid, vec![item("v1", 100, 1)]);
        let txn = storage.begin_write().unwrap();
        storage.put_order(&txn, &order).unwrap();
        txn.commit().unwrap();

        // 商家不存在 → 延后
        let results = engine.settle_vendors(&order);
        assert!(!results[0].is_applied());
        let pending = storage.get_pending_settlements().unwrap().remove(0);
        assert!(engine.retry_pending(&pending).is_err());

        seed_vendor(&storage, "v1");
        assert!(engine.retry_pending(&pending).unwrap());
        assert!(storage.get_pending_settlements().unwrap().is_empty());
        assert_eq!(wallet(&storage, "v1").wallet_balance, Decimal::from(98));
    }
}
