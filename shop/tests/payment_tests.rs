mod support;

use common::generate_unique_id;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};

use shop::entities::{OrderStatus, PaymentStatus, product, variant};
use shop::error::ShopError;
use shop::model::Viewer;
use shop::notify::{ORDER_STATUS, STOCK_UPDATE};

use support::*;

async fn product_stock(db: &sea_orm::DatabaseConnection, id: i64) -> i32 {
    product::Entity::find_by_id(id)
        .one(db)
        .await
        .unwrap()
        .unwrap()
        .stock
}

async fn variant_stock(db: &sea_orm::DatabaseConnection, id: i64) -> i32 {
    variant::Entity::find_by_id(id)
        .one(db)
        .await
        .unwrap()
        .unwrap()
        .stock
}

#[tokio::test]
async fn confirm_payment_deducts_stock_and_flips_status() {
    let db = setup_db().await;
    let (store, sink) = make_store(&db);
    let cart_id = generate_unique_id("CART");

    let tee = seed_product(&db, "Tee", "TEE", 50_000, 10, None).await;
    seed_cart_line(&db, &cart_id, tee.id, None, 2, tee.price).await;
    let created = store
        .checkout(&Viewer::user(1), checkout_request(&cart_id))
        .await
        .unwrap();

    let mut rx = sink.subscribe();
    let confirmed = store.confirm_payment(created.order.id).await.unwrap();

    assert_eq!(confirmed.order.payment_status, PaymentStatus::Paid);
    assert_eq!(confirmed.order.status, OrderStatus::AwaitingConfirmation);
    assert_eq!(product_stock(&db, tee.id).await, 8);

    // One stock event per decremented entity, then the order status event.
    let stock_event = rx.recv().await.unwrap();
    assert_eq!(stock_event.event, STOCK_UPDATE);
    assert_eq!(stock_event.payload["productId"], tee.id);
    assert_eq!(stock_event.payload["stock"], 8);

    let status_event = rx.recv().await.unwrap();
    assert_eq!(status_event.event, ORDER_STATUS);
    assert_eq!(status_event.payload["orderId"], created.order.id);
    assert_eq!(status_event.payload["status"], "AWAITING_CONFIRMATION");
    assert_eq!(status_event.payload["paymentStatus"], "PAID");
}

#[tokio::test]
async fn second_confirmation_fails_without_touching_stock() {
    let db = setup_db().await;
    let (store, _) = make_store(&db);
    let cart_id = generate_unique_id("CART");

    let tee = seed_product(&db, "Tee", "TEE", 50_000, 10, None).await;
    seed_cart_line(&db, &cart_id, tee.id, None, 2, tee.price).await;
    let created = store
        .checkout(&Viewer::user(1), checkout_request(&cart_id))
        .await
        .unwrap();

    store.confirm_payment(created.order.id).await.unwrap();
    assert_eq!(product_stock(&db, tee.id).await, 8);

    let second = store.confirm_payment(created.order.id).await;
    assert!(matches!(second, Err(ShopError::AlreadyPaid(id)) if id == created.order.id));
    assert_eq!(product_stock(&db, tee.id).await, 8);
}

#[tokio::test]
async fn short_stock_on_any_line_rolls_back_every_line() {
    let db = setup_db().await;
    let (store, sink) = make_store(&db);
    let cart_id = generate_unique_id("CART");

    let tee = seed_product(&db, "Tee", "TEE", 50_000, 10, None).await;
    let mug = seed_product(&db, "Mug", "MUG", 30_000, 5, None).await;
    seed_cart_line(&db, &cart_id, tee.id, None, 2, tee.price).await;
    seed_cart_line(&db, &cart_id, mug.id, None, 1, mug.price).await;
    let created = store
        .checkout(&Viewer::user(1), checkout_request(&cart_id))
        .await
        .unwrap();

    // Drain the mug between checkout and confirmation.
    let mut drained: product::ActiveModel = product::Entity::find_by_id(mug.id)
        .one(&db)
        .await
        .unwrap()
        .unwrap()
        .into();
    drained.stock = Set(0);
    drained.update(&db).await.unwrap();

    let mut rx = sink.subscribe();
    let result = store.confirm_payment(created.order.id).await;
    match result {
        Err(ShopError::InsufficientStock {
            sku,
            available,
            requested,
            ..
        }) => {
            assert_eq!(sku, "MUG");
            assert_eq!(available, 0);
            assert_eq!(requested, 1);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    // The tee decrement inside the aborted transaction did not persist,
    // the order is untouched, and nothing was emitted.
    assert_eq!(product_stock(&db, tee.id).await, 10);
    assert_eq!(product_stock(&db, mug.id).await, 0);
    let order = store
        .get_order(&Viewer::user(1), created.order.id)
        .await
        .unwrap();
    assert_eq!(order.order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.order.status, OrderStatus::Pending);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn variant_lines_deduct_variant_stock_only() {
    let db = setup_db().await;
    let (store, _) = make_store(&db);
    let cart_id = generate_unique_id("CART");

    let tee = seed_product(&db, "Tee", "TEE", 50_000, 7, None).await;
    let red_m = seed_variant(&db, tee.id, "TEE-RED-M", 52_000, 4, None).await;
    seed_cart_line(&db, &cart_id, tee.id, Some(red_m.id), 3, red_m.price).await;
    let created = store
        .checkout(&Viewer::user(1), checkout_request(&cart_id))
        .await
        .unwrap();

    store.confirm_payment(created.order.id).await.unwrap();

    assert_eq!(variant_stock(&db, red_m.id).await, 1);
    assert_eq!(product_stock(&db, tee.id).await, 7);
}

#[tokio::test]
async fn confirming_an_unknown_order_is_not_found() {
    let db = setup_db().await;
    let (store, _) = make_store(&db);

    let result = store.confirm_payment(404).await;
    assert!(matches!(result, Err(ShopError::NotFound(_))));
}
