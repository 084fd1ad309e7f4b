//! OrdersManager - 订单生命周期状态机
//!
//! # State machine
//!
//! ```text
//! Pending ──confirm──► Confirmed ──preparing──► Preparing
//!                          │                       │
//!                          └────────ready──────────┴──► ReadyForPickup
//!                                                          │ claim
//!                          Confirmed ◄──reject (pre-pickup)─┤
//!                                                          ▼
//!                                                   OutForDelivery ──deliver──► Delivered*
//!
//! Pending | Confirmed | Preparing | ReadyForPickup ──cancel──► Cancelled*
//! ```
//!
//! # Operation flow
//!
//! ```text
//! operation(order_id, actor)
//!     ├─ 1. Begin write transaction
//!     ├─ 2. Load order (+ vendor / rider records)
//!     ├─ 3. Check predecessor status and actor
//!     ├─ 4. Mutate order, append history
//!     ├─ 5. Persist (order + touched accounts + deadline index)
//!     ├─ 6. Commit
//!     ├─ 7. Arm / disarm deadline timer, run vendor settlement
//!     └─ 8. Publish notifications
//! ```
//!
//! The predecessor check in step 3 runs inside the write transaction, so
//! every transition is a compare-and-swap on the order's status.

use crate::accounts::{rider_txn, vendor_txn};
use crate::assignment::AssignmentBroker;
use crate::core::error::{FulfillmentError, FulfillmentResult};
use crate::deadline::{PREPARATION_WINDOW_MS, PreparationDeadlineMonitor};
use crate::ledger::LedgerStorage;
use crate::notify::NotificationSink;
use crate::orders::money::{MAX_QUANTITY, items_subtotal, money_eq, order_total};
use crate::payment::{PaymentError, PaymentVerifier};
use crate::settlement::{SettlementEngine, settle_rider};
use rust_decimal::Decimal;
use shared::message::{Channel, LifecycleEvent};
use shared::models::{Account, PendingSettlement, Role};
use shared::order::{
    CreateOrderRequest, DeliveryOutcome, Order, OrderItem, OrderStatus, PaymentMethod,
};
use shared::util::{now_millis, uuid_string};
use std::sync::Arc;

pub struct OrdersManager {
    storage: LedgerStorage,
    sink: Arc<dyn NotificationSink>,
    verifier: Arc<dyn PaymentVerifier>,
    deadlines: PreparationDeadlineMonitor,
    broker: AssignmentBroker,
    settlement: SettlementEngine,
}

impl std::fmt::Debug for OrdersManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrdersManager")
            .field("storage", &"<LedgerStorage>")
            .field("deadlines", &self.deadlines)
            .finish()
    }
}

impl OrdersManager {
    pub fn new(
        storage: LedgerStorage,
        sink: Arc<dyn NotificationSink>,
        verifier: Arc<dyn PaymentVerifier>,
        deadlines: PreparationDeadlineMonitor,
    ) -> Self {
        let broker = AssignmentBroker::new(storage.clone(), sink.clone());
        let settlement = SettlementEngine::new(storage.clone(), sink.clone());
        Self {
            storage,
            sink,
            verifier,
            deadlines,
            broker,
            settlement,
        }
    }

    pub fn settlement_engine(&self) -> &SettlementEngine {
        &self.settlement
    }

    pub fn deadlines(&self) -> &PreparationDeadlineMonitor {
        &self.deadlines
    }

    // ========== Queries ==========

    pub fn get_order(&self, order_id: &str) -> FulfillmentResult<Order> {
        self.storage
            .get_order(order_id)?
            .ok_or_else(|| FulfillmentError::OrderNotFound(order_id.to_string()))
    }

    pub fn list_orders(&self, status: Option<OrderStatus>) -> FulfillmentResult<Vec<Order>> {
        Ok(self.storage.list_orders(status)?)
    }

    // ========== CreateOrder ==========

    /// Place an order priced from the catalog
    ///
    /// The client subtotal is advisory: a mismatch is logged, the stored
    /// amounts always come from current product prices.
    pub async fn create_order(&self, req: CreateOrderRequest) -> FulfillmentResult<Order> {
        if req.items.is_empty() {
            return Err(FulfillmentError::Validation("order has no items".into()));
        }
        if let Some(bad) = req
            .items
            .iter()
            .find(|i| i.quantity == 0 || i.quantity > MAX_QUANTITY)
        {
            return Err(FulfillmentError::Validation(format!(
                "quantity for {} must be between 1 and {}, got {}",
                bad.product_id, MAX_QUANTITY, bad.quantity
            )));
        }

        let payment_proof = match req.payment_method {
            PaymentMethod::OnlinePrepaid => {
                let proof = req
                    .payment_proof
                    .ok_or(FulfillmentError::PaymentProofRequired)?;
                self.verifier.verify(&proof).await.map_err(|e| match e {
                    PaymentError::InvalidSignature(_) => {
                        FulfillmentError::PaymentVerificationFailed(e.to_string())
                    }
                    PaymentError::Unavailable(_) => FulfillmentError::PaymentUnavailable(e.to_string()),
                })?;
                Some(proof)
            }
            PaymentMethod::CashOnDelivery => None,
        };

        let txn = self.storage.begin_write()?;

        match self.storage.get_account_txn(&txn, &req.customer_id)? {
            Some(Account::Customer(_)) => {}
            Some(_) => {
                return Err(FulfillmentError::RoleMismatch {
                    account_id: req.customer_id.clone(),
                    expected: Role::Customer,
                });
            }
            None => return Err(FulfillmentError::CustomerNotFound(req.customer_id.clone())),
        }

        let mut items = Vec::with_capacity(req.items.len());
        for input in &req.items {
            let product = self
                .storage
                .get_product(&input.product_id)?
                .ok_or_else(|| FulfillmentError::ProductNotFound(input.product_id.clone()))?;
            if !product.is_available {
                return Err(FulfillmentError::ProductUnavailable(product.id));
            }
            items.push(OrderItem {
                product_id: product.id,
                vendor_id: product.vendor_id,
                name: product.name,
                unit_price: product.price,
                quantity: input.quantity,
            });
        }

        let now = now_millis();
        let subtotal = items_subtotal(&items);
        let mut order = Order {
            id: uuid_string(),
            customer_id: req.customer_id,
            items,
            subtotal,
            delivery_charge: super::money::DELIVERY_CHARGE,
            platform_fee: super::money::PLATFORM_FEE,
            total: order_total(subtotal),
            payment_method: req.payment_method,
            payment_proof,
            status: OrderStatus::Pending,
            created_at: now,
            accepted_at: None,
            preparation_deadline: None,
            ready_at: None,
            picked_up_at: None,
            delivered_at: None,
            cancelled_at: None,
            cancel_reason: None,
            assigned_rider_id: None,
            delivery_rating: None,
            late_fee_applied: false,
            late_fee_amount: None,
            history: Vec::new(),
        };
        order.transition(OrderStatus::Pending, now, None);

        // 商家离线则不创建订单
        for vendor_id in order.vendor_ids() {
            if !vendor_txn(&self.storage, &txn, &vendor_id)?.is_online {
                return Err(FulfillmentError::VendorOffline(vendor_id));
            }
        }

        if let Some(client_subtotal) = req.client_subtotal
            && !money_eq(client_subtotal, subtotal)
        {
            tracing::warn!(
                client_subtotal = %client_subtotal,
                subtotal = %subtotal,
                "Client subtotal differs from catalog pricing, using catalog"
            );
        }

        if let Some(proof) = &order.payment_proof {
            if proof.amount != order.total {
                return Err(FulfillmentError::PaymentVerificationFailed(format!(
                    "payment {} covers {}, order total is {}",
                    proof.payment_id, proof.amount, order.total
                )));
            }
            // 同一笔支付只能用于一个订单
            if let Some(paid_order) = self.storage.payment_consumed_by_txn(&txn, &proof.payment_id)? {
                tracing::warn!(payment_id = %proof.payment_id, paid_order = %paid_order, "Payment proof replayed");
                return Err(FulfillmentError::PaymentAlreadyUsed {
                    payment_id: proof.payment_id.clone(),
                    order_id: paid_order,
                });
            }
            self.storage.consume_payment(&txn, &proof.payment_id, &order.id)?;
        }

        self.storage.put_order(&txn, &order)?;
        txn.commit()?;

        tracing::info!(order_id = %order.id, customer_id = %order.customer_id, total = %order.total, "Order placed");

        let event = LifecycleEvent::OrderPlaced {
            order_id: order.id.clone(),
            customer_id: order.customer_id.clone(),
            total: order.total,
        };
        let mut channels = self.order_channels(&order);
        channels.push(Channel::Admin);
        self.sink.publish_many(channels, event);

        Ok(order)
    }

    // ========== Vendor transitions ==========

    /// Pending → Confirmed, arms the preparation deadline
    pub fn confirm_order(&self, order_id: &str, vendor_id: &str) -> FulfillmentResult<Order> {
        let txn = self.storage.begin_write()?;
        let mut order = self.load_for_vendor(&txn, order_id, vendor_id)?;
        Self::require_status(&order, &[OrderStatus::Pending], "confirm")?;

        for vid in order.vendor_ids() {
            if !vendor_txn(&self.storage, &txn, &vid)?.is_online {
                return Err(FulfillmentError::VendorOffline(vid));
            }
        }

        let now = now_millis();
        let deadline = now + PREPARATION_WINDOW_MS;
        order.accepted_at = Some(now);
        order.preparation_deadline = Some(deadline);
        order.transition(OrderStatus::Confirmed, now, None);

        self.storage.put_order(&txn, &order)?;
        self.storage.put_deadline(&txn, order_id, deadline)?;
        txn.commit()?;

        self.deadlines.arm(order_id, deadline);
        tracing::info!(order_id = %order_id, vendor_id = %vendor_id, preparation_deadline = deadline, "Order confirmed");

        self.sink.publish_many(
            self.order_channels(&order),
            LifecycleEvent::OrderConfirmed {
                order_id: order_id.to_string(),
                preparation_deadline: deadline,
            },
        );
        Ok(order)
    }

    /// Confirmed → Preparing (deadline keeps running)
    pub fn start_preparing(&self, order_id: &str, vendor_id: &str) -> FulfillmentResult<Order> {
        let txn = self.storage.begin_write()?;
        let mut order = self.load_for_vendor(&txn, order_id, vendor_id)?;
        Self::require_status(&order, &[OrderStatus::Confirmed], "start preparing")?;

        order.transition(OrderStatus::Preparing, now_millis(), None);
        self.storage.put_order(&txn, &order)?;
        txn.commit()?;

        tracing::info!(order_id = %order_id, vendor_id = %vendor_id, "Preparation started");
        self.sink.publish(
            Channel::Customer(order.customer_id.clone()),
            LifecycleEvent::PreparationStarted {
                order_id: order_id.to_string(),
            },
        );
        Ok(order)
    }

    /// Confirmed | Preparing → ReadyForPickup, disarms the deadline and
    /// broadcasts the offer to riders
    pub fn mark_ready(&self, order_id: &str, vendor_id: &str) -> FulfillmentResult<Order> {
        let txn = self.storage.begin_write()?;
        let mut order = self.load_for_vendor(&txn, order_id, vendor_id)?;
        Self::require_status(
            &order,
            &[OrderStatus::Confirmed, OrderStatus::Preparing],
            "mark ready",
        )?;

        let now = now_millis();
        // 骑手退单后再次出餐保留首次出餐时间
        order.ready_at.get_or_insert(now);
        order.transition(OrderStatus::ReadyForPickup, now, None);

        self.storage.put_order(&txn, &order)?;
        self.storage.remove_deadline(&txn, order_id)?;
        txn.commit()?;

        self.deadlines.disarm(order_id);
        tracing::info!(order_id = %order_id, vendor_id = %vendor_id, "Order ready for pickup");

        if let Err(e) = self.broker.broadcast_ready(&order) {
            tracing::error!(order_id = %order_id, error = %e, "Failed to broadcast ready order");
        }
        Ok(order)
    }

    /// Cancel before a rider takes the order
    pub fn cancel_order(&self, order_id: &str, reason: Option<String>) -> FulfillmentResult<Order> {
        let txn = self.storage.begin_write()?;
        let mut order = self
            .storage
            .get_order_txn(&txn, order_id)?
            .ok_or_else(|| FulfillmentError::OrderNotFound(order_id.to_string()))?;
        if !order.status.is_cancellable() {
            return Err(FulfillmentError::InvalidStateTransition {
                order_id: order_id.to_string(),
                from: order.status,
                operation: "cancel",
            });
        }

        let was_offered = order.status == OrderStatus::ReadyForPickup;
        let now = now_millis();
        order.cancelled_at = Some(now);
        order.cancel_reason = reason.clone();
        order.transition(OrderStatus::Cancelled, now, reason.clone());

        self.storage.put_order(&txn, &order)?;
        self.storage.remove_deadline(&txn, order_id)?;
        txn.commit()?;

        self.deadlines.disarm(order_id);
        tracing::info!(order_id = %order_id, reason = ?reason, "Order cancelled");

        let mut channels = self.order_channels(&order);
        channels.push(Channel::Admin);
        if was_offered {
            channels.push(Channel::Riders);
        }
        self.sink.publish_many(
            channels,
            LifecycleEvent::OrderCancelled {
                order_id: order_id.to_string(),
                reason,
            },
        );
        Ok(order)
    }

    // ========== Rider transitions ==========

    pub fn claim_order(&self, order_id: &str, rider_id: &str) -> FulfillmentResult<Order> {
        self.broker.claim_order(order_id, rider_id)
    }

    pub fn reject_claim(&self, order_id: &str, rider_id: &str) -> FulfillmentResult<Order> {
        self.broker.reject_claim(order_id, rider_id)
    }

    pub fn confirm_pickup(&self, order_id: &str, rider_id: &str) -> FulfillmentResult<Order> {
        self.broker.confirm_pickup(order_id, rider_id)
    }

    /// OutForDelivery → Delivered, settles exactly once
    ///
    /// The rider is credited in the same transaction as the transition, and
    /// every vendor credit is recorded there as owed. Vendors are then
    /// settled one transaction each; a failure stays queued for the
    /// settlement worker and never undoes the delivery.
    pub fn deliver_order(
        &self,
        order_id: &str,
        rider_id: &str,
        rating: Option<u8>,
    ) -> FulfillmentResult<DeliveryOutcome> {
        let (order, rider_fee) = self.commit_delivery(order_id, rider_id, rating)?;

        let vendor_settlements = self.settlement.settle_vendors(&order);

        let mut channels = self.order_channels(&order);
        channels.push(Channel::Admin);
        self.sink.publish_many(
            channels,
            LifecycleEvent::OrderDelivered {
                order_id: order_id.to_string(),
                rider_id: rider_id.to_string(),
                delivered_at: order.delivered_at.unwrap_or_default(),
            },
        );

        Ok(DeliveryOutcome {
            order,
            rider_fee,
            vendor_settlements,
        })
    }

    /// Delivered CAS + rider credit + owed vendor credits, one transaction
    pub(crate) fn commit_delivery(
        &self,
        order_id: &str,
        rider_id: &str,
        rating: Option<u8>,
    ) -> FulfillmentResult<(Order, Decimal)> {
        if let Some(r) = rating
            && !(1..=5).contains(&r)
        {
            return Err(FulfillmentError::Validation(format!(
                "rating must be between 1 and 5, got {}",
                r
            )));
        }

        let txn = self.storage.begin_write()?;
        let mut order = self
            .storage
            .get_order_txn(&txn, order_id)?
            .ok_or_else(|| FulfillmentError::OrderNotFound(order_id.to_string()))?;

        if order.status == OrderStatus::Delivered {
            tracing::warn!(order_id = %order_id, rider_id = %rider_id, "Duplicate delivery rejected");
            return Err(FulfillmentError::AlreadyDelivered(order_id.to_string()));
        }
        if !order.is_assigned_to(rider_id) {
            return Err(FulfillmentError::ClaimNotHeld {
                order_id: order_id.to_string(),
                rider_id: rider_id.to_string(),
            });
        }
        Self::require_status(&order, &[OrderStatus::OutForDelivery], "deliver")?;

        let mut rider = rider_txn(&self.storage, &txn, rider_id)?;

        let now = now_millis();
        order.picked_up_at.get_or_insert(now);
        order.delivered_at = Some(now);
        order.delivery_rating = rating;
        order.transition(OrderStatus::Delivered, now, None);
        let rider_fee = settle_rider(&mut rider, rating);

        self.storage.put_order(&txn, &order)?;
        self.storage.put_account(&txn, &Account::Rider(rider))?;
        for vendor_id in order.vendor_ids() {
            self.storage
                .queue_settlement_txn(&txn, &PendingSettlement::owed(order_id, vendor_id, now))?;
        }
        txn.commit()?;

        tracing::info!(order_id = %order_id, rider_id = %rider_id, rider_fee = %rider_fee, "Order delivered");
        Ok((order, rider_fee))
    }

    // ========== Helpers ==========

    fn load_for_vendor(
        &self,
        txn: &redb::WriteTransaction,
        order_id: &str,
        vendor_id: &str,
    ) -> FulfillmentResult<Order> {
        let order = self
            .storage
            .get_order_txn(txn, order_id)?
            .ok_or_else(|| FulfillmentError::OrderNotFound(order_id.to_string()))?;
        if !order.involves_vendor(vendor_id) {
            return Err(FulfillmentError::NotOrderVendor {
                order_id: order_id.to_string(),
                vendor_id: vendor_id.to_string(),
            });
        }
        Ok(order)
    }

    fn require_status(
        order: &Order,
        allowed: &[OrderStatus],
        operation: &'static str,
    ) -> FulfillmentResult<()> {
        if allowed.contains(&order.status) {
            Ok(())
        } else {
            Err(FulfillmentError::InvalidStateTransition {
                order_id: order.id.clone(),
                from: order.status,
                operation,
            })
        }
    }

    /// Customer + every vendor of the order
    fn order_channels(&self, order: &Order) -> Vec<Channel> {
        let mut channels = vec![Channel::Customer(order.customer_id.clone())];
        channels.extend(order.vendor_ids().into_iter().map(Channel::Vendor));
        channels
    }
}

#[cfg(test)]
mod tests;
