use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, NotSet,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

use crate::discount::{self, DiscountOutcome, EvalLine};
use crate::entities::{
    OrderStatus, PaymentMethod, PaymentStatus, cart_item, order, order_item, product, variant,
};
use crate::error::{Result, ShopError};
use crate::model::{
    CheckoutRequest, CreateDiscountRequest, DiscountValidation, OrderWithItems,
    UpdateStatusRequest, ValidateDiscountRequest, Viewer,
};
use crate::notify::{self, NotificationSink};
use crate::stock;

/// Checkout, payment confirmation and order queries over one database
/// connection. All multi-row writes run inside a single transaction;
/// notifications go out only after commit.
pub struct OrderStore {
    db: DatabaseConnection,
    sink: Arc<dyn NotificationSink>,
}

/// One cart line joined with the catalog rows it points at.
struct CartLineView {
    item: cart_item::Model,
    product: product::Model,
    variant: Option<variant::Model>,
}

impl CartLineView {
    fn sku(&self) -> &str {
        self.variant
            .as_ref()
            .map(|v| v.sku.as_str())
            .unwrap_or(self.product.sku.as_str())
    }

    fn available_stock(&self) -> i32 {
        self.variant
            .as_ref()
            .map(|v| v.stock)
            .unwrap_or(self.product.stock)
    }
}

async fn load_cart<C: ConnectionTrait>(conn: &C, cart_id: &str) -> Result<Vec<CartLineView>> {
    let items = cart_item::Entity::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .order_by_asc(cart_item::Column::Id)
        .all(conn)
        .await?;

    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        let product = product::Entity::find_by_id(item.product_id)
            .one(conn)
            .await?
            .ok_or_else(|| ShopError::NotFound(format!("product {}", item.product_id)))?;
        let variant = match item.variant_id {
            Some(variant_id) => Some(
                variant::Entity::find_by_id(variant_id)
                    .one(conn)
                    .await?
                    .ok_or_else(|| ShopError::NotFound(format!("variant {variant_id}")))?,
            ),
            None => None,
        };
        lines.push(CartLineView {
            item,
            product,
            variant,
        });
    }
    Ok(lines)
}

fn eval_lines(cart: &[CartLineView]) -> Vec<EvalLine> {
    cart.iter()
        .map(|line| EvalLine {
            product_id: line.product.id,
            category_id: line.product.category_id,
            quantity: line.item.quantity,
            unit_price: line.item.unit_price,
        })
        .collect()
}

impl OrderStore {
    pub fn new(db: DatabaseConnection, sink: Arc<dyn NotificationSink>) -> Self {
        Self { db, sink }
    }

    /// Convert a cart into a persisted order. One transaction covers the
    /// order row, its line snapshots, the discount usage increment and the
    /// cart clearance; either all of it lands or none does.
    pub async fn checkout(
        &self,
        viewer: &Viewer,
        request: CheckoutRequest,
    ) -> Result<OrderWithItems> {
        if request.shipping_address.trim().is_empty() {
            return Err(ShopError::Validation("shipping address is required".into()));
        }
        if request.shipping_fee < 0 {
            return Err(ShopError::Validation(
                "shipping fee must not be negative".into(),
            ));
        }
        if !(0..=100).contains(&request.vat_percent) {
            return Err(ShopError::Validation(
                "vat percent must be between 0 and 100".into(),
            ));
        }
        let payment_method = PaymentMethod::parse(&request.payment_method)
            .ok_or_else(|| ShopError::InvalidPaymentMethod(request.payment_method.clone()))?;

        let txn = self.db.begin().await?;

        let cart = load_cart(&txn, &request.cart_id).await?;
        if cart.is_empty() {
            return Err(ShopError::EmptyCart);
        }
        for line in &cart {
            if line.item.quantity < 1 {
                return Err(ShopError::Validation(format!(
                    "quantity must be at least 1 for {}",
                    line.sku()
                )));
            }
            // Snapshot-time availability check; the hard guard runs again
            // at payment confirmation.
            if line.available_stock() < line.item.quantity {
                return Err(ShopError::InsufficientStock {
                    sku: line.sku().to_string(),
                    product_id: line.product.id,
                    variant_id: line.item.variant_id,
                    available: line.available_stock(),
                    requested: line.item.quantity,
                });
            }
        }

        let subtotal: i64 = cart
            .iter()
            .map(|line| line.item.unit_price * line.item.quantity as i64)
            .sum();

        // Checkout never aborts on a bad code: a rejected discount means
        // zero discount. The standalone validate endpoint surfaces the
        // rejection instead.
        let mut discount_total = 0i64;
        let mut applied_code = None;
        if let Some(code) = request
            .discount_code
            .as_deref()
            .filter(|code| !code.trim().is_empty())
        {
            let lines = eval_lines(&cart);
            match discount::evaluate(&txn, code, &lines, subtotal, Utc::now().naive_utc()).await? {
                DiscountOutcome::Applied {
                    discount_id,
                    code,
                    total,
                } => {
                    if discount::consume_usage(&txn, discount_id).await? {
                        discount_total = total;
                        applied_code = Some(code);
                    } else {
                        debug!(%code, "usage limit hit by a concurrent checkout, applying zero discount");
                    }
                }
                DiscountOutcome::Rejected(reason) => {
                    debug!(code, %reason, "ignoring invalid discount code at checkout");
                }
            }
        }

        let vat_amount =
            (subtotal - discount_total + request.shipping_fee) * request.vat_percent / 100;
        let total = subtotal - discount_total + request.shipping_fee + vat_amount;

        let order = order::ActiveModel {
            id: NotSet,
            user_id: Set(viewer.user_id),
            status: Set(OrderStatus::Pending),
            payment_method: Set(payment_method),
            payment_status: Set(PaymentStatus::Pending),
            subtotal: Set(subtotal),
            discount_total: Set(discount_total),
            discount_code: Set(applied_code),
            shipping_fee: Set(request.shipping_fee),
            vat_percent: Set(request.vat_percent),
            vat_amount: Set(vat_amount),
            total: Set(total),
            shipping_address: Set(request.shipping_address.trim().to_string()),
            notes: Set(request.notes),
            bank_ref: Set(request.bank_ref),
            admin_notes: Set(None),
            created_at: Set(Utc::now().naive_utc()),
        };
        let order = order.insert(&txn).await?;

        let mut items = Vec::with_capacity(cart.len());
        for line in &cart {
            let item = order_item::ActiveModel {
                id: NotSet,
                order_id: Set(order.id),
                product_id: Set(line.product.id),
                variant_id: Set(line.item.variant_id),
                name: Set(line.product.name.clone()),
                sku: Set(line.sku().to_string()),
                attributes: Set(line.variant.as_ref().and_then(|v| v.attributes.clone())),
                quantity: Set(line.item.quantity),
                price: Set(line.item.unit_price),
            };
            items.push(item.insert(&txn).await?);
        }

        cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.eq(&request.cart_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        info!(order_id = order.id, total, "checkout complete");
        Ok(OrderWithItems { order, items })
    }

    /// Flip an order to PAID exactly once and deduct stock for every line.
    /// Any short line aborts the whole transaction, so a partial deduction
    /// never persists. Stock and status notifications go out post-commit.
    pub async fn confirm_payment(&self, order_id: i64) -> Result<OrderWithItems> {
        let txn = self.db.begin().await?;

        let order = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ShopError::NotFound(format!("order {order_id}")))?;
        if order.payment_status == PaymentStatus::Paid {
            return Err(ShopError::AlreadyPaid(order_id));
        }

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::Id)
            .all(&txn)
            .await?;

        let mut changes = Vec::with_capacity(items.len());
        for item in &items {
            changes.push(stock::deduct_for_line(&txn, item).await?);
        }

        let mut active: order::ActiveModel = order.into();
        active.payment_status = Set(PaymentStatus::Paid);
        active.status = Set(OrderStatus::AwaitingConfirmation);
        let order = active.update(&txn).await?;

        txn.commit().await?;

        for change in &changes {
            self.sink.emit(
                notify::STOCK_UPDATE,
                json!({
                    "productId": change.product_id,
                    "variantId": change.variant_id,
                    "stock": change.stock,
                }),
            );
        }
        self.sink.emit(
            notify::ORDER_STATUS,
            json!({
                "orderId": order.id,
                "status": order.status,
                "paymentStatus": order.payment_status,
            }),
        );

        info!(order_id, "payment confirmed");
        Ok(OrderWithItems { order, items })
    }

    /// Admin status update. Any status may follow any other; only unknown
    /// status strings are rejected.
    pub async fn update_status(
        &self,
        viewer: &Viewer,
        order_id: i64,
        request: UpdateStatusRequest,
    ) -> Result<OrderWithItems> {
        if !viewer.admin {
            return Err(ShopError::Forbidden);
        }
        let new_status = OrderStatus::parse(&request.status)
            .ok_or_else(|| ShopError::InvalidStatus(request.status.clone()))?;

        let order = order::Entity::find_by_id(order_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ShopError::NotFound(format!("order {order_id}")))?;

        let mut active: order::ActiveModel = order.into();
        active.status = Set(new_status);
        if let Some(notes) = request.admin_notes {
            active.admin_notes = Set(Some(notes));
        }
        let order = active.update(&self.db).await?;

        self.sink.emit(
            notify::ORDER_STATUS,
            json!({
                "orderId": order.id,
                "status": order.status,
                "paymentStatus": order.payment_status,
            }),
        );

        info!(order_id, status = order.status.as_str(), "order status updated");
        let items = self.items_of(order_id).await?;
        Ok(OrderWithItems { order, items })
    }

    pub async fn get_order(&self, viewer: &Viewer, order_id: i64) -> Result<OrderWithItems> {
        let order = order::Entity::find_by_id(order_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ShopError::NotFound(format!("order {order_id}")))?;
        if !viewer.can_view(order.user_id) {
            return Err(ShopError::Forbidden);
        }
        let items = self.items_of(order_id).await?;
        Ok(OrderWithItems { order, items })
    }

    pub async fn list_orders(&self, viewer: &Viewer) -> Result<Vec<order::Model>> {
        let query = order::Entity::find().order_by_desc(order::Column::Id);
        let orders = if viewer.admin {
            query.all(&self.db).await?
        } else if let Some(user_id) = viewer.user_id {
            query
                .filter(order::Column::UserId.eq(user_id))
                .all(&self.db)
                .await?
        } else {
            return Err(ShopError::Forbidden);
        };
        Ok(orders)
    }

    /// Admin discount creation; code is normalized to uppercase on write.
    pub async fn create_discount(
        &self,
        viewer: &Viewer,
        request: CreateDiscountRequest,
    ) -> Result<crate::entities::discount::Model> {
        if !viewer.admin {
            return Err(ShopError::Forbidden);
        }
        discount::create_discount(&self.db, request).await
    }

    /// Standalone validate endpoint: same evaluator as checkout, but a
    /// rejected code is an error here and usage is not consumed.
    pub async fn validate_discount(
        &self,
        request: ValidateDiscountRequest,
    ) -> Result<DiscountValidation> {
        let cart = load_cart(&self.db, &request.cart_id).await?;
        let subtotal: i64 = cart
            .iter()
            .map(|line| line.item.unit_price * line.item.quantity as i64)
            .sum();
        let lines = eval_lines(&cart);
        match discount::evaluate(
            &self.db,
            &request.code,
            &lines,
            subtotal,
            Utc::now().naive_utc(),
        )
        .await?
        {
            DiscountOutcome::Applied { code, total, .. } => Ok(DiscountValidation {
                valid: true,
                code,
                discount_total: total,
            }),
            DiscountOutcome::Rejected(reason) => Err(ShopError::DiscountRejected(reason)),
        }
    }

    async fn items_of(&self, order_id: i64) -> Result<Vec<order_item::Model>> {
        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::Id)
            .all(&self.db)
            .await?;
        Ok(items)
    }
}
