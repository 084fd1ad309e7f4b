use super::*;

// ========================================================================
// CreateOrder
// ========================================================================

#[tokio::test]
async fn test_create_order_prices_from_catalog() {
    let env = create_test_manager();
    env.basic_catalog();

    let order = env
        .manager
        .create_order(CreateOrderRequest {
            customer_id: "c1".into(),
            items: vec![OrderItemInput {
                product_id: "p1".into(),
                quantity: 2,
            }],
            payment_method: PaymentMethod::CashOnDelivery,
            payment_proof: None,
            // 客户端金额被忽略
            client_subtotal: Some(Decimal::from(1)),
        })
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.subtotal, Decimal::from(200));
    assert_eq!(order.total, Decimal::from(244));
    assert_eq!(order.total, order.subtotal + order.delivery_charge + order.platform_fee);
    assert_eq!(order.items[0].vendor_id, "v1");
    assert_eq!(order.history.len(), 1);
    assert_eq!(env.sink.count("order_placed"), 3); // customer, vendor, admin

    let stored = env.manager.get_order(&order.id).unwrap();
    assert_eq!(stored, order);
}

#[tokio::test]
async fn test_create_order_rejects_offline_vendor() {
    let env = create_test_manager();
    env.basic_catalog();
    env.accounts.set_vendor_online("v1", false).unwrap();

    let err = env
        .manager
        .create_order(CreateOrderRequest {
            customer_id: "c1".into(),
            items: vec![OrderItemInput {
                product_id: "p1".into(),
                quantity: 1,
            }],
            payment_method: PaymentMethod::CashOnDelivery,
            payment_proof: None,
            client_subtotal: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, FulfillmentError::VendorOffline(ref v) if v == "v1"));
    assert!(env.manager.list_orders(None).unwrap().is_empty());
}

#[tokio::test]
async fn test_create_order_validation() {
    let env = create_test_manager();
    env.basic_catalog();

    let request = |product_id: &str, quantity: u32| CreateOrderRequest {
        customer_id: "c1".into(),
        items: vec![OrderItemInput {
            product_id: product_id.into(),
            quantity,
        }],
        payment_method: PaymentMethod::CashOnDelivery,
        payment_proof: None,
        client_subtotal: None,
    };

    assert!(matches!(
        env.manager.create_order(request("p1", 0)).await,
        Err(FulfillmentError::Validation(_))
    ));
    assert!(matches!(
        env.manager.create_order(request("p1", 100)).await,
        Err(FulfillmentError::Validation(_))
    ));
    assert!(matches!(
        env.manager.create_order(request("nope", 1)).await,
        Err(FulfillmentError::ProductNotFound(_))
    ));

    let mut unknown_customer = request("p1", 1);
    unknown_customer.customer_id = "ghost".into();
    assert!(matches!(
        env.manager.create_order(unknown_customer).await,
        Err(FulfillmentError::CustomerNotFound(_))
    ));

    env.accounts
        .upsert_product(ProductUpsert {
            id: "p1".into(),
            vendor_id: "v1".into(),
            name: "Sold out".into(),
            price: Decimal::from(100),
            is_available: false,
        })
        .unwrap();
    assert!(matches!(
        env.manager.create_order(request("p1", 1)).await,
        Err(FulfillmentError::ProductUnavailable(_))
    ));
}

#[tokio::test]
async fn test_online_order_requires_valid_proof() {
    let env = create_test_manager();
    env.basic_catalog();

    let mut req = CreateOrderRequest {
        customer_id: "c1".into(),
        items: vec![OrderItemInput {
            product_id: "p1".into(),
            quantity: 1,
        }],
        payment_method: PaymentMethod::OnlinePrepaid,
        payment_proof: None,
        client_subtotal: None,
    };
    assert!(matches!(
        env.manager.create_order(req.clone()).await,
        Err(FulfillmentError::PaymentProofRequired)
    ));

    let mut forged = env.proof(Decimal::from(144));
    forged.payment_id = "pay_other".into();
    req.payment_proof = Some(forged);
    assert!(matches!(
        env.manager.create_order(req.clone()).await,
        Err(FulfillmentError::PaymentVerificationFailed(_))
    ));

    req.payment_proof = Some(env.proof(Decimal::from(144)));
    let order = env.manager.create_order(req).await.unwrap();
    assert!(order.payment_proof.is_some());
}

fn online_request(quantity: u32, proof: PaymentProof) -> CreateOrderRequest {
    CreateOrderRequest {
        customer_id: "c1".into(),
        items: vec![OrderItemInput {
            product_id: "p1".into(),
            quantity,
        }],
        payment_method: PaymentMethod::OnlinePrepaid,
        payment_proof: Some(proof),
        client_subtotal: None,
    }
}

#[tokio::test]
async fn test_payment_proof_backs_one_order_only() {
    let env = create_test_manager();
    env.basic_catalog();

    let proof = env.proof(Decimal::from(144));
    let first = env
        .manager
        .create_order(online_request(1, proof.clone()))
        .await
        .unwrap();

    // 同一笔支付再次下单
    match env.manager.create_order(online_request(1, proof)).await {
        Err(FulfillmentError::PaymentAlreadyUsed { order_id, .. }) => assert_eq!(order_id, first.id),
        other => panic!("expected PaymentAlreadyUsed, got {:?}", other),
    }
    assert_eq!(env.manager.list_orders(None).unwrap().len(), 1);
}

#[tokio::test]
async fn test_payment_proof_must_cover_order_total() {
    let env = create_test_manager();
    env.basic_catalog();

    // 144 的支付凭证用于 99 份（9944）
    let proof = env.proof(Decimal::from(144));
    assert!(matches!(
        env.manager.create_order(online_request(99, proof.clone())).await,
        Err(FulfillmentError::PaymentVerificationFailed(_))
    ));

    // 改写金额会破坏签名
    let mut stretched = proof;
    stretched.amount = Decimal::from(9944);
    assert!(matches!(
        env.manager.create_order(online_request(99, stretched)).await,
        Err(FulfillmentError::PaymentVerificationFailed(_))
    ));

    // 被拒绝的订单不消耗支付
    let order = env
        .manager
        .create_order(online_request(99, env.proof(Decimal::from(9944))))
        .await
        .unwrap();
    assert_eq!(order.total, Decimal::from(9944));
}

// ========================================================================
// Vendor transitions
// ========================================================================

#[tokio::test]
async fn test_confirm_sets_deadline_and_index() {
    let env = create_test_manager();
    env.basic_catalog();
    let order = env.place(vec![("p1", 1)], PaymentMethod::CashOnDelivery).await;

    let confirmed = env.manager.confirm_order(&order.id, "v1").unwrap();
    assert_eq!(confirmed.status, OrderStatus::Confirmed);
    let accepted = confirmed.accepted_at.unwrap();
    assert_eq!(
        confirmed.preparation_deadline,
        Some(accepted + PREPARATION_WINDOW_MS)
    );
    assert_eq!(env.storage.get_deadlines().unwrap().len(), 1);
    assert!(env.manager.deadlines().is_armed(&order.id));

    // 只能确认一次
    assert!(matches!(
        env.manager.confirm_order(&order.id, "v1"),
        Err(FulfillmentError::InvalidStateTransition { from: OrderStatus::Confirmed, .. })
    ));
}

#[tokio::test]
async fn test_confirm_requires_online_owning_vendor() {
    let env = create_test_manager();
    env.basic_catalog();
    env.vendor("v2");
    let order = env.place(vec![("p1", 1)], PaymentMethod::CashOnDelivery).await;

    assert!(matches!(
        env.manager.confirm_order(&order.id, "v2"),
        Err(FulfillmentError::NotOrderVendor { .. })
    ));

    env.accounts.set_vendor_online("v1", false).unwrap();
    assert!(matches!(
        env.manager.confirm_order(&order.id, "v1"),
        Err(FulfillmentError::VendorOffline(_))
    ));
    assert_eq!(env.manager.get_order(&order.id).unwrap().status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_ready_disarms_deadline_and_broadcasts() {
    let env = create_test_manager();
    env.basic_catalog();
    env.rider("r1");
    env.rider("r2");
    env.accounts.set_rider_online("r2", false).unwrap();

    let order = env.place(vec![("p1", 1)], PaymentMethod::CashOnDelivery).await;
    env.manager.confirm_order(&order.id, "v1").unwrap();
    env.manager.start_preparing(&order.id, "v1").unwrap();
    let ready = env.manager.mark_ready(&order.id, "v1").unwrap();

    assert_eq!(ready.status, OrderStatus::ReadyForPickup);
    assert!(ready.ready_at.is_some());
    assert!(!env.manager.deadlines().is_armed(&order.id));
    assert!(env.storage.get_deadlines().unwrap().is_empty());

    // 只推送给在线空闲骑手 + Riders 频道
    assert_eq!(env.sink.events_for(&Channel::Rider("r1".into())).len(), 1);
    assert!(env.sink.events_for(&Channel::Rider("r2".into())).is_empty());
    assert_eq!(env.sink.events_for(&Channel::Riders).len(), 1);

    let statuses: Vec<OrderStatus> = ready.history.iter().map(|h| h.status).collect();
    assert_eq!(
        statuses,
        vec![
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::ReadyForPickup
        ]
    );
}

#[tokio::test]
async fn test_ready_requires_confirmation() {
    let env = create_test_manager();
    env.basic_catalog();
    let order = env.place(vec![("p1", 1)], PaymentMethod::CashOnDelivery).await;

    assert!(matches!(
        env.manager.mark_ready(&order.id, "v1"),
        Err(FulfillmentError::InvalidStateTransition { from: OrderStatus::Pending, .. })
    ));
    assert!(matches!(
        env.manager.start_preparing(&order.id, "v1"),
        Err(FulfillmentError::InvalidStateTransition { .. })
    ));
}

// ========================================================================
// Cancel
// ========================================================================

#[tokio::test]
async fn test_cancel_disarms_deadline() {
    let env = create_test_manager();
    env.basic_catalog();
    let order = env.place(vec![("p1", 1)], PaymentMethod::CashOnDelivery).await;
    env.manager.confirm_order(&order.id, "v1").unwrap();

    let cancelled = env
        .manager
        .cancel_order(&order.id, Some("kitchen closed".into()))
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.cancel_reason.as_deref(), Some("kitchen closed"));
    assert!(cancelled.cancelled_at.is_some());
    assert!(!env.manager.deadlines().is_armed(&order.id));
    assert!(env.storage.get_deadlines().unwrap().is_empty());

    // 迟到的定时器触发是空操作
    assert_eq!(env.manager.deadlines().apply_late_fee(&order.id).unwrap(), None);

    assert!(matches!(
        env.manager.cancel_order(&order.id, None),
        Err(FulfillmentError::InvalidStateTransition { from: OrderStatus::Cancelled, .. })
    ));
}

#[tokio::test]
async fn test_cannot_cancel_out_for_delivery() {
    let env = create_test_manager();
    env.basic_catalog();
    env.rider("r1");
    let order = env.ready_order(vec![("p1", 1)], PaymentMethod::CashOnDelivery).await;
    env.manager.claim_order(&order.id, "r1").unwrap();

    assert!(matches!(
        env.manager.cancel_order(&order.id, None),
        Err(FulfillmentError::InvalidStateTransition { from: OrderStatus::OutForDelivery, .. })
    ));
}

#[tokio::test]
async fn test_list_orders_by_status() {
    let env = create_test_manager();
    env.basic_catalog();
    let a = env.place(vec![("p1", 1)], PaymentMethod::CashOnDelivery).await;
    env.place(vec![("p1", 2)], PaymentMethod::CashOnDelivery).await;
    env.manager.confirm_order(&a.id, "v1").unwrap();

    assert_eq!(env.manager.list_orders(None).unwrap().len(), 2);
    let confirmed = env.manager.list_orders(Some(OrderStatus::Confirmed)).unwrap();
    assert_eq!(confirmed.len(), 1);
    assert_eq!(confirmed[0].id, a.id);
    assert!(matches!(
        env.manager.get_order("missing"),
        Err(FulfillmentError::OrderNotFound(_))
    ));
}
