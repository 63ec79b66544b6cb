use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use tracing::debug;

use crate::entities::{order_item, product, variant};
use crate::error::{Result, ShopError};

/// Post-decrement stock level for one catalog entity, reported to the
/// notification sink after the owning transaction commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockChange {
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub stock: i32,
}

/// Decrement stock for one order line with a conditional update
/// (`stock = stock - qty WHERE stock >= qty`), so two concurrent
/// confirmations racing on the same row cannot oversell. Zero rows
/// affected means either the row vanished or the stock is short; the
/// follow-up read distinguishes the two for the error payload.
pub async fn deduct_for_line<C: ConnectionTrait>(
    conn: &C,
    line: &order_item::Model,
) -> Result<StockChange> {
    if let Some(variant_id) = line.variant_id {
        let result = variant::Entity::update_many()
            .col_expr(
                variant::Column::Stock,
                Expr::col(variant::Column::Stock).sub(line.quantity),
            )
            .filter(variant::Column::Id.eq(variant_id))
            .filter(variant::Column::Stock.gte(line.quantity))
            .exec(conn)
            .await?;
        let current = variant::Entity::find_by_id(variant_id).one(conn).await?;
        if result.rows_affected == 0 {
            return match current {
                None => Err(ShopError::NotFound(format!("variant {variant_id}"))),
                Some(v) => Err(ShopError::InsufficientStock {
                    sku: line.sku.clone(),
                    product_id: line.product_id,
                    variant_id: Some(variant_id),
                    available: v.stock,
                    requested: line.quantity,
                }),
            };
        }
        let updated = current
            .ok_or_else(|| ShopError::NotFound(format!("variant {variant_id}")))?;
        debug!(variant_id, stock = updated.stock, "decremented variant stock");
        Ok(StockChange {
            product_id: line.product_id,
            variant_id: Some(variant_id),
            stock: updated.stock,
        })
    } else {
        let product_id = line.product_id;
        let result = product::Entity::update_many()
            .col_expr(
                product::Column::Stock,
                Expr::col(product::Column::Stock).sub(line.quantity),
            )
            .filter(product::Column::Id.eq(product_id))
            .filter(product::Column::Stock.gte(line.quantity))
            .exec(conn)
            .await?;
        let current = product::Entity::find_by_id(product_id).one(conn).await?;
        if result.rows_affected == 0 {
            return match current {
                None => Err(ShopError::NotFound(format!("product {product_id}"))),
                Some(p) => Err(ShopError::InsufficientStock {
                    sku: line.sku.clone(),
                    product_id,
                    variant_id: None,
                    available: p.stock,
                    requested: line.quantity,
                }),
            };
        }
        let updated = current
            .ok_or_else(|| ShopError::NotFound(format!("product {product_id}")))?;
        debug!(product_id, stock = updated.stock, "decremented product stock");
        Ok(StockChange {
            product_id,
            variant_id: None,
            stock: updated.stock,
        })
    }
}
