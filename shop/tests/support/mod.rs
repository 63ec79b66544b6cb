#![allow(dead_code)]

use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, NotSet, Set};
use std::sync::Arc;

use shop::entities::{DiscountKind, cart_item, category, discount, product, variant};
use shop::model::CheckoutRequest;
use shop::notify::BroadcastSink;
use shop::order_store::OrderStore;
use shop::schema;

/// Fresh in-memory SQLite database with the full schema. Pinned to a
/// single pooled connection so every query sees the same database.
pub async fn setup_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:".to_owned());
    options.max_connections(1).min_connections(1);
    let db = Database::connect(options).await.expect("connect sqlite");
    schema::create_tables(&db).await.expect("create schema");
    db
}

pub fn make_store(db: &DatabaseConnection) -> (OrderStore, Arc<BroadcastSink>) {
    let sink = Arc::new(BroadcastSink::new(64));
    let store = OrderStore::new(db.clone(), sink.clone());
    (store, sink)
}

pub async fn seed_category(db: &DatabaseConnection, id: i64, name: &str) -> category::Model {
    category::ActiveModel {
        id: Set(id),
        name: Set(name.to_string()),
    }
    .insert(db)
    .await
    .expect("insert category")
}

pub async fn seed_product(
    db: &DatabaseConnection,
    name: &str,
    sku: &str,
    price: i64,
    stock: i32,
    category_id: Option<i64>,
) -> product::Model {
    product::ActiveModel {
        id: NotSet,
        category_id: Set(category_id),
        name: Set(name.to_string()),
        sku: Set(sku.to_string()),
        price: Set(price),
        stock: Set(stock),
    }
    .insert(db)
    .await
    .expect("insert product")
}

pub async fn seed_variant(
    db: &DatabaseConnection,
    product_id: i64,
    sku: &str,
    price: i64,
    stock: i32,
    attributes: Option<serde_json::Value>,
) -> variant::Model {
    variant::ActiveModel {
        id: NotSet,
        product_id: Set(product_id),
        sku: Set(sku.to_string()),
        attributes: Set(attributes),
        price: Set(price),
        stock: Set(stock),
    }
    .insert(db)
    .await
    .expect("insert variant")
}

pub async fn seed_cart_line(
    db: &DatabaseConnection,
    cart_id: &str,
    product_id: i64,
    variant_id: Option<i64>,
    quantity: i32,
    unit_price: i64,
) -> cart_item::Model {
    cart_item::ActiveModel {
        id: NotSet,
        cart_id: Set(cart_id.to_string()),
        product_id: Set(product_id),
        variant_id: Set(variant_id),
        quantity: Set(quantity),
        unit_price: Set(unit_price),
        created_at: Set(chrono::Utc::now().naive_utc()),
    }
    .insert(db)
    .await
    .expect("insert cart line")
}

/// Active, unscoped, unlimited 10% discount; tests override fields before
/// inserting.
pub fn base_discount(code: &str) -> discount::ActiveModel {
    discount::ActiveModel {
        id: NotSet,
        code: Set(code.to_uppercase()),
        kind: Set(DiscountKind::Percent),
        value: Set(10),
        min_order: Set(None),
        start_at: Set(None),
        end_at: Set(None),
        usage_limit: Set(None),
        used: Set(0),
        active: Set(true),
        product_ids: Set(None),
        category_ids: Set(None),
        created_at: Set(chrono::Utc::now().naive_utc()),
    }
}

pub fn checkout_request(cart_id: &str) -> CheckoutRequest {
    CheckoutRequest {
        cart_id: cart_id.to_string(),
        shipping_address: "12 Tran Hung Dao, Hanoi".to_string(),
        payment_method: "COD".to_string(),
        shipping_fee: 0,
        vat_percent: 10,
        discount_code: None,
        notes: None,
        bank_ref: None,
    }
}
