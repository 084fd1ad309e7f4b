//! Assignment Broker
//!
//! Advertises ready orders to idle riders and resolves the claim race.
//!
//! # Claim protocol
//!
//! ```text
//! MarkReady ──► broadcast_ready ──► FoodReady ──► Rider(id)… + Riders
//!                                                     │
//!           claim_order(order, rider)  ◄──────────────┘  (N riders race)
//!                 │
//!                 ▼
//!   ┌──────────── one redb write transaction ────────────┐
//!   │ order.status == ReadyForPickup && assigned == None  │
//!   │ rider online && idle                                │
//!   │ order ─► OutForDelivery, assigned = rider           │
//!   │ rider ─► current_order = order, available = false   │
//!   └─────────────────────────────────────────────────────┘
//!                 │ commit
//!                 ▼
//!   winner: Ok(order)        losers: AlreadyClaimed
//! ```
//!
//! redb serialises write transactions, so the predicate and the write of
//! both records are one atomic step: there is never a claimed order with a
//! stale rider record, or the reverse.

use crate::accounts::rider_txn;
use crate::core::error::{FulfillmentError, FulfillmentResult};
use crate::ledger::LedgerStorage;
use crate::notify::NotificationSink;
use shared::message::{Channel, LifecycleEvent};
use shared::models::Account;
use shared::order::{Order, OrderStatus, RiderOrderStatus};
use shared::util::now_millis;
use std::sync::Arc;

/// 抢单窗口（客户端展示时长，毫秒）
pub const CLAIM_OFFER_WINDOW_MS: i64 = 30 * 1000;

#[derive(Clone)]
pub struct AssignmentBroker {
    storage: LedgerStorage,
    sink: Arc<dyn NotificationSink>,
}

impl std::fmt::Debug for AssignmentBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssignmentBroker").finish_non_exhaustive()
    }
}

impl AssignmentBroker {
    pub fn new(storage: LedgerStorage, sink: Arc<dyn NotificationSink>) -> Self {
        Self { storage, sink }
    }

    /// Publish a FoodReady offer to every online, idle rider
    ///
    /// Returns the number of riders targeted individually; the `Riders`
    /// fan-out channel always receives the offer.
    pub fn broadcast_ready(&self, order: &Order) -> FulfillmentResult<usize> {
        let event = LifecycleEvent::FoodReady {
            order_id: order.id.clone(),
            vendor_ids: order.vendor_ids(),
            offer_expires_at: now_millis() + CLAIM_OFFER_WINDOW_MS,
        };

        let mut channels: Vec<Channel> = self
            .storage
            .list_riders()?
            .into_iter()
            .filter(|r| r.is_idle())
            .map(|r| Channel::Rider(r.id))
            .collect();
        let targeted = channels.len();
        channels.push(Channel::Riders);

        self.sink.publish_many(channels, event);
        tracing::info!(order_id = %order.id, riders = targeted, "Food ready offer broadcast");
        Ok(targeted)
    }

    /// Claim a ready order for a rider (at most one winner)
    pub fn claim_order(&self, order_id: &str, rider_id: &str) -> FulfillmentResult<Order> {
        let txn = self.storage.begin_write()?;
        let mut order = self
            .storage
            .get_order_txn(&txn, order_id)?
            .ok_or_else(|| FulfillmentError::OrderNotFound(order_id.to_string()))?;
        let mut rider = rider_txn(&self.storage, &txn, rider_id)?;

        if order.status.is_terminal() {
            return Err(FulfillmentError::InvalidStateTransition {
                order_id: order_id.to_string(),
                from: order.status,
                operation: "claim",
            });
        }
        if let Some(holder) = &order.assigned_rider_id {
            tracing::info!(order_id = %order_id, rider_id = %rider_id, holder = %holder, "Claim lost, order already assigned");
            return Err(FulfillmentError::AlreadyClaimed(order_id.to_string()));
        }
        if order.status != OrderStatus::ReadyForPickup {
            return Err(FulfillmentError::InvalidStateTransition {
                order_id: order_id.to_string(),
                from: order.status,
                operation: "claim",
            });
        }
        if !rider.is_online {
            return Err(FulfillmentError::RiderOffline(rider_id.to_string()));
        }
        if !rider.is_available || rider.current_order_id.is_some() {
            return Err(FulfillmentError::RiderBusy(rider_id.to_string()));
        }

        let now = now_millis();
        order.assigned_rider_id = Some(rider_id.to_string());
        order.transition(OrderStatus::OutForDelivery, now, None);
        rider.current_order_id = Some(order_id.to_string());
        rider.current_order_status = Some(RiderOrderStatus::Assigned);
        rider.is_available = false;

        self.storage.put_order(&txn, &order)?;
        self.storage.put_account(&txn, &Account::Rider(rider))?;
        txn.commit()?;

        tracing::info!(order_id = %order_id, rider_id = %rider_id, "Order claimed");

        let mut channels = vec![Channel::Customer(order.customer_id.clone())];
        channels.extend(order.vendor_ids().into_iter().map(Channel::Vendor));
        channels.push(Channel::Riders);
        self.sink.publish_many(
            channels,
            LifecycleEvent::OrderClaimed {
                order_id: order_id.to_string(),
                rider_id: rider_id.to_string(),
            },
        );

        Ok(order)
    }

    /// Rider gives the order back before pickup
    ///
    /// The order returns to Confirmed (ready_at kept); the vendor re-offers it
    /// with MarkReady.
    pub fn reject_claim(&self, order_id: &str, rider_id: &str) -> FulfillmentResult<Order> {
        let txn = self.storage.begin_write()?;
        let mut order = self
            .storage
            .get_order_txn(&txn, order_id)?
            .ok_or_else(|| FulfillmentError::OrderNotFound(order_id.to_string()))?;

        if !order.is_assigned_to(rider_id) {
            return Err(FulfillmentError::ClaimNotHeld {
                order_id: order_id.to_string(),
                rider_id: rider_id.to_string(),
            });
        }
        if order.status != OrderStatus::OutForDelivery {
            return Err(FulfillmentError::InvalidStateTransition {
                order_id: order_id.to_string(),
                from: order.status,
                operation: "reject",
            });
        }
        if order.picked_up_at.is_some() {
            return Err(FulfillmentError::AlreadyPickedUp(order_id.to_string()));
        }

        let mut rider = rider_txn(&self.storage, &txn, rider_id)?;

        order.assigned_rider_id = None;
        order.transition(
            OrderStatus::Confirmed,
            now_millis(),
            Some(format!("released by rider {}", rider_id)),
        );
        rider.current_order_id = None;
        rider.current_order_status = Some(RiderOrderStatus::Cancelled);
        rider.is_available = true;
        rider.total_cancellations += 1;

        self.storage.put_order(&txn, &order)?;
        self.storage.put_account(&txn, &Account::Rider(rider))?;
        txn.commit()?;

        tracing::info!(order_id = %order_id, rider_id = %rider_id, "Claim released before pickup");

        let mut channels = vec![Channel::Customer(order.customer_id.clone())];
        channels.extend(order.vendor_ids().into_iter().map(Channel::Vendor));
        self.sink.publish_many(
            channels,
            LifecycleEvent::ClaimReleased {
                order_id: order_id.to_string(),
                rider_id: rider_id.to_string(),
            },
        );

        Ok(order)
    }

    /// Rider collected the food (sets `picked_up_at` once)
    pub fn confirm_pickup(&self, order_id: &str, rider_id: &str) -> FulfillmentResult<Order> {
        let txn = self.storage.begin_write()?;
        let mut order = self
            .storage
            .get_order_txn(&txn, order_id)?
            .ok_or_else(|| FulfillmentError::OrderNotFound(order_id.to_string()))?;

        if !order.is_assigned_to(rider_id) {
            return Err(FulfillmentError::ClaimNotHeld {
                order_id: order_id.to_string(),
                rider_id: rider_id.to_string(),
            });
        }
        if order.status != OrderStatus::OutForDelivery {
            return Err(FulfillmentError::InvalidStateTransition {
                order_id: order_id.to_string(),
                from: order.status,
                operation: "pick up",
            });
        }
        if order.picked_up_at.is_some() {
            return Err(FulfillmentError::AlreadyPickedUp(order_id.to_string()));
        }

        let mut rider = rider_txn(&self.storage, &txn, rider_id)?;

        let now = now_millis();
        order.picked_up_at = Some(now);
        order.transition(OrderStatus::OutForDelivery, now, Some("picked up".to_string()));
        rider.current_order_status = Some(RiderOrderStatus::PickedUp);

        self.storage.put_order(&txn, &order)?;
        self.storage.put_account(&txn, &Account::Rider(rider))?;
        txn.commit()?;

        tracing::info!(order_id = %order_id, rider_id = %rider_id, "Order picked up");

        let mut channels = vec![Channel::Customer(order.customer_id.clone())];
        channels.extend(order.vendor_ids().into_iter().map(Channel::Vendor));
        self.sink.publish_many(
            channels,
            LifecycleEvent::OrderPickedUp {
                order_id: order_id.to_string(),
                rider_id: rider_id.to_string(),
            },
        );

        Ok(order)
    }
}
