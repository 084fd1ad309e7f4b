use super::*;
use shared::models::CustomerProfile;
use shared::order::{RiderOrderStatus, VendorSettlementResult};

async fn delivered(env: &TestEnv, items: Vec<(&str, u32)>, method: PaymentMethod, rating: Option<u8>) -> DeliveryOutcome {
    let order = env.ready_order(items, method).await;
    env.manager.claim_order(&order.id, "r1").unwrap();
    env.manager.deliver_order(&order.id, "r1", rating).unwrap()
}

#[tokio::test]
async fn test_online_order_end_to_end() {
    let env = create_test_manager();
    env.basic_catalog();
    env.rider("r1");

    let outcome = delivered(&env, vec![("p1", 2)], PaymentMethod::OnlinePrepaid, None).await;
    assert_eq!(outcome.order.total, Decimal::from(244));
    assert_eq!(outcome.order.status, OrderStatus::Delivered);
    assert!(outcome.order.delivered_at.is_some());
    // 未确认取货时送达时间补写为取货时间
    assert!(outcome.order.picked_up_at.is_some());
    assert_eq!(outcome.rider_fee, Decimal::from(40));
    assert_eq!(
        outcome.vendor_settlements,
        vec![VendorSettlementResult::Applied {
            vendor_id: "v1".into(),
            vendor_income: Decimal::from(196),
        }]
    );

    let wallet = env.wallet("v1");
    assert_eq!(wallet.total_earnings, Decimal::from(196));
    assert_eq!(wallet.wallet_balance, Decimal::from(196));
    assert_eq!(wallet.online_earnings, Decimal::from(196));

    let rider = env.rider_profile("r1");
    assert_eq!(rider.total_earnings, Decimal::from(40));
    assert_eq!(rider.wallet_balance, Decimal::from(40));
    assert_eq!(rider.total_deliveries, 1);
    assert!(rider.is_available);
    assert!(rider.current_order_id.is_none());
    assert_eq!(rider.current_order_status, Some(RiderOrderStatus::Delivered));
}

#[tokio::test]
async fn test_cash_order_does_not_touch_wallet_balance() {
    let env = create_test_manager();
    env.basic_catalog();
    env.rider("r1");

    delivered(&env, vec![("p1", 2)], PaymentMethod::CashOnDelivery, None).await;
    let wallet = env.wallet("v1");
    assert_eq!(wallet.total_earnings, Decimal::from(196));
    assert_eq!(wallet.wallet_balance, Decimal::ZERO);
    assert_eq!(wallet.online_earnings, Decimal::ZERO);
}

#[tokio::test]
async fn test_double_delivery_settles_once() {
    let env = create_test_manager();
    env.basic_catalog();
    env.rider("r1");

    let outcome = delivered(&env, vec![("p1", 1)], PaymentMethod::OnlinePrepaid, None).await;
    let err = env
        .manager
        .deliver_order(&outcome.order.id, "r1", None)
        .unwrap_err();
    assert!(matches!(err, FulfillmentError::AlreadyDelivered(_)));

    assert_eq!(env.wallet("v1").total_earnings, Decimal::from(98));
    let rider = env.rider_profile("r1");
    assert_eq!(rider.total_deliveries, 1);
    assert_eq!(rider.total_earnings, Decimal::from(40));
}

#[tokio::test]
async fn test_deliver_requires_holding_rider() {
    let env = create_test_manager();
    env.basic_catalog();
    env.rider("r1");
    env.rider("r2");
    let order = env.ready_order(vec![("p1", 1)], PaymentMethod::CashOnDelivery).await;

    assert!(matches!(
        env.manager.deliver_order(&order.id, "r1", None),
        Err(FulfillmentError::ClaimNotHeld { .. })
    ));
    env.manager.claim_order(&order.id, "r1").unwrap();
    assert!(matches!(
        env.manager.deliver_order(&order.id, "r2", None),
        Err(FulfillmentError::ClaimNotHeld { .. })
    ));
    assert!(matches!(
        env.manager.deliver_order(&order.id, "r1", Some(6)),
        Err(FulfillmentError::Validation(_))
    ));
}

#[tokio::test]
async fn test_rating_running_mean_across_deliveries() {
    let env = create_test_manager();
    env.basic_catalog();
    env.rider("r1");

    delivered(&env, vec![("p1", 1)], PaymentMethod::CashOnDelivery, Some(3)).await;
    assert_eq!(env.rider_profile("r1").average_rating, 3.0);

    delivered(&env, vec![("p1", 1)], PaymentMethod::CashOnDelivery, Some(5)).await;
    let rider = env.rider_profile("r1");
    assert_eq!(rider.average_rating, 4.0);
    assert_eq!(rider.total_deliveries, 2);
}

#[tokio::test]
async fn test_multi_vendor_split() {
    let env = create_test_manager();
    env.basic_catalog();
    env.vendor("v2");
    env.product("p2", "v2", 50);
    env.rider("r1");

    let order = env
        .place(vec![("p1", 1), ("p2", 3)], PaymentMethod::OnlinePrepaid)
        .await;
    assert_eq!(order.subtotal, Decimal::from(250));
    env.manager.confirm_order(&order.id, "v2").unwrap();
    env.manager.mark_ready(&order.id, "v1").unwrap();
    env.manager.claim_order(&order.id, "r1").unwrap();
    let outcome = env.manager.deliver_order(&order.id, "r1", None).unwrap();

    assert!(outcome.vendor_settlements.iter().all(|s| s.is_applied()));
    assert_eq!(env.wallet("v1").wallet_balance, Decimal::from(98));
    assert_eq!(env.wallet("v2").wallet_balance, Decimal::from(147));
}

#[tokio::test]
async fn test_vendor_failure_does_not_block_delivery() {
    let env = create_test_manager();
    env.basic_catalog();
    env.rider("r1");
    let order = env.ready_order(vec![("p1", 2)], PaymentMethod::OnlinePrepaid).await;
    env.manager.claim_order(&order.id, "r1").unwrap();

    // 商家账号被替换成其他角色，入账必然失败
    let txn = env.storage.begin_write().unwrap();
    env.storage
        .put_account(
            &txn,
            &Account::Customer(CustomerProfile {
                id: "v1".into(),
                name: "broken".into(),
                email: "broken@example.com".into(),
                created_at: 0,
            }),
        )
        .unwrap();
    txn.commit().unwrap();

    let outcome = env.manager.deliver_order(&order.id, "r1", Some(5)).unwrap();
    assert_eq!(outcome.order.status, OrderStatus::Delivered);
    assert!(matches!(
        outcome.vendor_settlements[0],
        VendorSettlementResult::Deferred { .. }
    ));

    // 骑手照常结算
    assert_eq!(env.rider_profile("r1").total_earnings, Decimal::from(40));
    assert_eq!(env.storage.get_pending_settlements().unwrap().len(), 1);
    assert_eq!(env.sink.count("vendor_settlement_deferred"), 1);
}

#[tokio::test]
async fn test_vendor_credited_after_exit_before_settlement() {
    use crate::settlement::SettlementWorker;

    let env = create_test_manager();
    env.basic_catalog();
    env.rider("r1");

    let order = env.ready_order(vec![("p1", 2)], PaymentMethod::OnlinePrepaid).await;
    env.manager.claim_order(&order.id, "r1").unwrap();

    // 只提交送达事务，模拟进程在商家入账前退出
    let (delivered, rider_fee) = env.manager.commit_delivery(&order.id, "r1", None).unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);
    assert_eq!(rider_fee, Decimal::from(40));
    assert_eq!(env.wallet("v1").total_earnings, Decimal::ZERO);

    let owed = env.storage.get_pending_settlements().unwrap();
    assert_eq!(owed.len(), 1);
    assert_eq!(owed[0].vendor_id, "v1");
    assert_eq!(owed[0].retry_count, 0);

    let worker = SettlementWorker::new(env.storage.clone(), env.manager.settlement_engine().clone());
    assert_eq!(worker.process_due(now_millis() + 60_000), 1);

    let wallet = env.wallet("v1");
    assert_eq!(wallet.total_earnings, Decimal::from(196));
    assert_eq!(wallet.wallet_balance, Decimal::from(196));
    assert!(env.storage.get_pending_settlements().unwrap().is_empty());

    // 再扫一次不会重复入账
    assert_eq!(worker.process_due(now_millis() + 120_000), 0);
    assert_eq!(env.wallet("v1").total_earnings, Decimal::from(196));
}

#[tokio::test]
async fn test_inline_settlement_clears_owed_entries() {
    let env = create_test_manager();
    env.basic_catalog();
    env.rider("r1");

    delivered(&env, vec![("p1", 1)], PaymentMethod::OnlinePrepaid, None).await;
    assert!(env.storage.get_pending_settlements().unwrap().is_empty());
}
