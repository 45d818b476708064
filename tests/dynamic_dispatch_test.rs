use chrono::Utc;
use enrollpay::domain::coupon::{Coupon, DiscountType};
use enrollpay::domain::course::PriceBreakdown;
use enrollpay::domain::ids::{CouponId, CourseId, UserId};
use enrollpay::domain::money::Money;
use enrollpay::domain::order::{NewOrder, OrderCode};
use enrollpay::domain::ports::{
    ChargeOutcome, Completion, CouponStoreBox, OrderStoreBox, PaymentGatewayBox, PaymentRequest,
    PurchaseLedgerBox,
};
use enrollpay::infrastructure::in_memory::InMemoryStore;
use enrollpay::infrastructure::payment::SimulatedGateway;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_stores_as_trait_objects() {
    let store = InMemoryStore::new();
    let coupon_store: CouponStoreBox = Box::new(store.clone());
    let order_store: OrderStoreBox = Box::new(store.clone());
    let ledger: PurchaseLedgerBox = Box::new(store);

    let coupon = Coupon {
        id: CouponId(1),
        code: "WELCOME".to_string(),
        discount_type: DiscountType::Fixed,
        discount_value: dec!(5),
        min_order_amount: None,
        max_discount_amount: None,
        is_active: true,
        valid_from: None,
        valid_to: None,
        usage_limit: None,
        used_count: 0,
    };

    let new_order = NewOrder {
        code: OrderCode::generate(Utc::now()),
        user_id: UserId(1),
        course_id: CourseId(1),
        prices: PriceBreakdown::new(Money::new(dec!(50)).unwrap(), Money::new(dec!(5)).unwrap()),
        coupon_id: Some(CouponId(1)),
        created_at: Utc::now(),
    };

    // Verify Send + Sync by spawning tasks
    let coupon_handle = tokio::spawn(async move {
        coupon_store.store(coupon).await.unwrap();
        coupon_store.find_by_code("WELCOME").await.unwrap().unwrap()
    });
    let order_handle = tokio::spawn(async move {
        let order = order_store.create_pending(new_order).await.unwrap();
        order_store.get(order.id).await.unwrap().unwrap()
    });

    let stored_coupon = coupon_handle.await.unwrap();
    assert_eq!(stored_coupon.id, CouponId(1));
    let order = order_handle.await.unwrap();
    assert_eq!(order.final_price, Money::new(dec!(45)).unwrap());

    let outcome = tokio::spawn(async move {
        ledger
            .complete(Completion {
                order_id: order.id,
                payment_method: "credit_card".to_string(),
                paid_at: Utc::now(),
            })
            .await
            .unwrap()
    })
    .await
    .unwrap();
    assert!(!outcome.already_paid);
    assert_eq!(outcome.enrollment.user_id, UserId(1));
}

#[tokio::test]
async fn test_gateway_as_trait_object() {
    let gateway: PaymentGatewayBox = Box::new(SimulatedGateway::new().declining("voucher"));
    let request = PaymentRequest {
        order_code: OrderCode::from("ORD-DYNAMIC1-0".to_string()),
        user_id: UserId(9),
        amount: Money::new(dec!(12.5)).unwrap(),
        method: "voucher".to_string(),
    };

    let outcome = tokio::spawn(async move { gateway.charge(&request).await.unwrap() })
        .await
        .unwrap();
    assert!(matches!(outcome, ChargeOutcome::Declined { .. }));
}
