/// Shop backend: checkout, discounts, stock ledger and order admin over a
/// relational store, with realtime change notifications.
pub mod cache;
pub mod discount;
pub mod entities;
pub mod error;
pub mod http;
pub mod model;
pub mod notify;
pub mod order_store;
pub mod schema;
pub mod shipping;
pub mod stock;
