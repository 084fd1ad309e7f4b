//! Delivery settlement through to vendor and rider payouts.

mod common;

use std::sync::Arc;

use common::Harness;
use fulfillment_server::FulfillmentError;
use fulfillment_server::notify::NoopSink;
use fulfillment_server::settlement::{SettlementWorker, WithdrawalService};
use rust_decimal::Decimal;
use shared::models::{
    PendingSettlement, ProcessWithdrawalRequest, WithdrawalOutcome, WithdrawalRequest,
    WithdrawalStatus,
};
use shared::order::{OrderStatus, PaymentMethod};

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn withdrawals(harness: &Harness, min: &str, auto_approve: bool) -> WithdrawalService {
    WithdrawalService::new(
        harness.storage.clone(),
        Arc::new(NoopSink),
        dec(min),
        auto_approve,
    )
}

/// Online order of 2 x 100 from v1, delivered by r1 with a 4-star rating
async fn delivered_online_order(harness: &Harness) -> String {
    harness.basic_catalog();
    harness.rider("r1");
    let order = harness.ready_order(PaymentMethod::OnlinePrepaid).await;
    assert_eq!(order.total, dec("244"));

    harness.manager.claim_order(&order.id, "r1").unwrap();
    harness.manager.confirm_pickup(&order.id, "r1").unwrap();
    let outcome = harness.manager.deliver_order(&order.id, "r1", Some(4)).unwrap();
    assert_eq!(outcome.order.status, OrderStatus::Delivered);
    assert_eq!(outcome.rider_fee, dec("40"));
    assert!(outcome.vendor_settlements.iter().all(|s| s.is_applied()));
    order.id
}

#[tokio::test]
async fn test_online_order_settles_everyone() {
    let harness = Harness::in_memory();
    let order_id = delivered_online_order(&harness).await;

    let wallet = harness.vendor_profile("v1").wallet;
    // 200 - 20% commission
    assert_eq!(wallet.total_earnings, dec("160"));
    assert_eq!(wallet.wallet_balance, dec("160"));
    assert_eq!(wallet.online_earnings, dec("160"));

    let rider = harness.rider_profile("r1");
    assert_eq!(rider.total_earnings, dec("40"));
    assert_eq!(rider.wallet_balance, dec("40"));
    assert_eq!(rider.total_deliveries, 1);
    assert!((rider.average_rating - 4.0).abs() < f64::EPSILON);
    assert!(rider.is_idle());

    let record = harness
        .storage
        .get_vendor_settlement(&order_id, "v1")
        .unwrap()
        .unwrap();
    assert_eq!(record.commission, dec("40"));
    assert!(record.online);
}

#[tokio::test]
async fn test_vendor_withdrawal_boundary() {
    let harness = Harness::in_memory();
    delivered_online_order(&harness).await;
    let service = withdrawals(&harness, "100", true);

    let err = service
        .request_withdrawal(WithdrawalRequest {
            account_id: "v1".to_string(),
            amount: dec("160.01"),
        })
        .unwrap_err();
    assert!(matches!(err, FulfillmentError::InsufficientBalance { .. }));

    let withdrawal = service
        .request_withdrawal(WithdrawalRequest {
            account_id: "v1".to_string(),
            amount: dec("160"),
        })
        .unwrap();
    assert_eq!(withdrawal.status, WithdrawalStatus::Completed);
    assert_eq!(withdrawal.fee, dec("3.20"));
    assert_eq!(withdrawal.net_amount, dec("156.80"));

    let wallet = harness.vendor_profile("v1").wallet;
    assert_eq!(wallet.total_withdrawn, dec("160"));
    assert_eq!(wallet.wallet_balance, Decimal::ZERO);

    // 额度已用完
    let err = service
        .request_withdrawal(WithdrawalRequest {
            account_id: "v1".to_string(),
            amount: dec("100"),
        })
        .unwrap_err();
    assert!(matches!(err, FulfillmentError::InsufficientBalance { .. }));
}

#[tokio::test]
async fn test_rider_withdrawal_pending_then_cancelled() {
    let harness = Harness::in_memory();
    delivered_online_order(&harness).await;

    let err = withdrawals(&harness, "100", false)
        .request_withdrawal(WithdrawalRequest {
            account_id: "r1".to_string(),
            amount: dec("40"),
        })
        .unwrap_err();
    assert!(matches!(err, FulfillmentError::BelowMinimumWithdrawal { .. }));

    let service = withdrawals(&harness, "10", false);
    let withdrawal = service
        .request_withdrawal(WithdrawalRequest {
            account_id: "r1".to_string(),
            amount: dec("40"),
        })
        .unwrap();
    assert_eq!(withdrawal.status, WithdrawalStatus::Pending);
    assert_eq!(harness.rider_profile("r1").total_withdrawn, dec("40"));

    let cancelled = service
        .process_withdrawal(
            &withdrawal.id,
            ProcessWithdrawalRequest {
                outcome: WithdrawalOutcome::Cancel,
                note: Some("bank holiday".to_string()),
            },
        )
        .unwrap();
    assert_eq!(cancelled.status, WithdrawalStatus::Cancelled);

    let rider = harness.rider_profile("r1");
    assert_eq!(rider.total_withdrawn, Decimal::ZERO);
    assert_eq!(rider.wallet_balance, dec("40"));

    let err = service
        .process_withdrawal(
            &withdrawal.id,
            ProcessWithdrawalRequest {
                outcome: WithdrawalOutcome::Complete,
                note: None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, FulfillmentError::WithdrawalAlreadyProcessed(_)));
}

#[tokio::test]
async fn test_replayed_queue_entry_does_not_double_credit() {
    let harness = Harness::in_memory();
    let order_id = delivered_online_order(&harness).await;

    // 崩溃前残留的重试条目
    let stale = shared::util::now_millis() - 60_000;
    let mut pending = PendingSettlement::new(&order_id, "v1", "ledger busy".to_string(), stale);
    pending.last_attempt_at = Some(stale);
    harness.storage.queue_settlement(&pending).unwrap();

    let worker = SettlementWorker::new(
        harness.storage.clone(),
        harness.manager.settlement_engine().clone(),
    );
    assert_eq!(worker.process_pending_queue(), 1);
    assert!(harness.storage.get_pending_settlements().unwrap().is_empty());

    let wallet = harness.vendor_profile("v1").wallet;
    assert_eq!(wallet.total_earnings, dec("160"));
    assert_eq!(wallet.wallet_balance, dec("160"));
}
