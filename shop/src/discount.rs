use chrono::NaiveDateTime;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, NotSet, QueryFilter,
    Set,
};
use serde::Serialize;
use serde_json::json;
use std::fmt;
use tracing::debug;

use crate::entities::{DiscountKind, discount};
use crate::error::{Result, ShopError};
use crate::model::CreateDiscountRequest;

/// Why a discount code was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountReason {
    NotFound,
    Inactive,
    NotYetValid,
    Expired,
    UsageExceeded,
    MinimumNotMet,
}

impl fmt::Display for DiscountReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::NotFound => "discount code not found",
            Self::Inactive => "discount is inactive",
            Self::NotYetValid => "discount is not yet valid",
            Self::Expired => "discount has expired",
            Self::UsageExceeded => "discount usage limit reached",
            Self::MinimumNotMet => "order subtotal is below the discount minimum",
        };
        f.write_str(message)
    }
}

/// A cart line as the evaluator sees it: enough to decide scope
/// eligibility and compute the eligible total.
#[derive(Debug, Clone)]
pub struct EvalLine {
    pub product_id: i64,
    pub category_id: Option<i64>,
    pub quantity: i32,
    pub unit_price: i64,
}

impl EvalLine {
    pub fn line_total(&self) -> i64 {
        self.unit_price * self.quantity as i64
    }
}

#[derive(Debug, Clone)]
pub enum DiscountOutcome {
    Applied {
        discount_id: i64,
        code: String,
        total: i64,
    },
    Rejected(DiscountReason),
}

/// Codes are stored uppercase; lookups normalize so `summer10` and
/// `SUMMER10` resolve to the same row.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

fn scope_ids(value: &Option<serde_json::Value>) -> Vec<i64> {
    match value {
        Some(serde_json::Value::Array(items)) => {
            items.iter().filter_map(|v| v.as_i64()).collect()
        }
        _ => Vec::new(),
    }
}

/// Check everything about a discount that does not depend on the cart
/// contents: active flag, validity window, usage limit, minimum order.
pub fn check_rules(
    discount: &discount::Model,
    subtotal: i64,
    now: NaiveDateTime,
) -> std::result::Result<(), DiscountReason> {
    if !discount.active {
        return Err(DiscountReason::Inactive);
    }
    if let Some(start_at) = discount.start_at {
        if now < start_at {
            return Err(DiscountReason::NotYetValid);
        }
    }
    if let Some(end_at) = discount.end_at {
        if now > end_at {
            return Err(DiscountReason::Expired);
        }
    }
    if let Some(limit) = discount.usage_limit {
        if discount.used >= limit {
            return Err(DiscountReason::UsageExceeded);
        }
    }
    if let Some(min_order) = discount.min_order {
        if subtotal < min_order {
            return Err(DiscountReason::MinimumNotMet);
        }
    }
    Ok(())
}

/// Sum of price*qty over the lines the discount's scope covers. An empty
/// scope means every line is eligible.
pub fn eligible_total(discount: &discount::Model, lines: &[EvalLine]) -> i64 {
    let products = scope_ids(&discount.product_ids);
    let categories = scope_ids(&discount.category_ids);
    if products.is_empty() && categories.is_empty() {
        return lines.iter().map(EvalLine::line_total).sum();
    }
    lines
        .iter()
        .filter(|line| {
            products.contains(&line.product_id)
                || line
                    .category_id
                    .is_some_and(|category| categories.contains(&category))
        })
        .map(EvalLine::line_total)
        .sum()
}

/// PERCENT floors via integer division. FIXED is the flat value, applied
/// as-is even when it exceeds the eligible total.
pub fn discount_total(discount: &discount::Model, eligible: i64) -> i64 {
    match discount.kind {
        DiscountKind::Percent => eligible * discount.value / 100,
        DiscountKind::Fixed => discount.value,
    }
}

/// Evaluate a code against a cart snapshot. Never errors on a bad code;
/// rejection is an outcome so checkout can apply zero discount while the
/// standalone validate endpoint turns it into an error.
pub async fn evaluate<C: ConnectionTrait>(
    conn: &C,
    code: &str,
    lines: &[EvalLine],
    subtotal: i64,
    now: NaiveDateTime,
) -> Result<DiscountOutcome> {
    let normalized = normalize_code(code);
    let Some(discount) = discount::Entity::find()
        .filter(discount::Column::Code.eq(&normalized))
        .one(conn)
        .await?
    else {
        return Ok(DiscountOutcome::Rejected(DiscountReason::NotFound));
    };

    if let Err(reason) = check_rules(&discount, subtotal, now) {
        debug!(code = %normalized, %reason, "discount rejected");
        return Ok(DiscountOutcome::Rejected(reason));
    }

    let total = discount_total(&discount, eligible_total(&discount, lines));
    debug!(code = %normalized, total, "discount applicable");
    Ok(DiscountOutcome::Applied {
        discount_id: discount.id,
        code: discount.code,
        total,
    })
}

/// Consume one use of a discount with a conditional increment. Returns
/// false when the usage limit was reached by a concurrent checkout between
/// evaluation and this update; callers run this inside the order-creation
/// transaction.
pub async fn consume_usage<C: ConnectionTrait>(conn: &C, discount_id: i64) -> Result<bool> {
    let result = discount::Entity::update_many()
        .col_expr(
            discount::Column::Used,
            Expr::col(discount::Column::Used).add(1),
        )
        .filter(discount::Column::Id.eq(discount_id))
        .filter(
            Condition::any()
                .add(discount::Column::UsageLimit.is_null())
                .add(Expr::col(discount::Column::Used).lt(Expr::col(discount::Column::UsageLimit))),
        )
        .exec(conn)
        .await?;
    Ok(result.rows_affected == 1)
}

/// Admin creation. Normalizes the code to uppercase on write, the other
/// half of the normalization contract `evaluate` relies on.
pub async fn create_discount<C: ConnectionTrait>(
    conn: &C,
    request: CreateDiscountRequest,
) -> Result<discount::Model> {
    let code = normalize_code(&request.code);
    if code.is_empty() {
        return Err(ShopError::Validation("discount code must not be empty".into()));
    }
    let kind = DiscountKind::parse(&request.kind)
        .ok_or_else(|| ShopError::Validation(format!("invalid discount kind: {}", request.kind)))?;
    if request.value < 0 {
        return Err(ShopError::Validation("discount value must not be negative".into()));
    }
    if kind == DiscountKind::Percent && request.value > 100 {
        return Err(ShopError::Validation(
            "percent discount value must be between 0 and 100".into(),
        ));
    }
    if let Some(limit) = request.usage_limit {
        if limit < 1 {
            return Err(ShopError::Validation("usage limit must be at least 1".into()));
        }
    }

    let model = discount::ActiveModel {
        id: NotSet,
        code: Set(code),
        kind: Set(kind),
        value: Set(request.value),
        min_order: Set(request.min_order),
        start_at: Set(request.start_at),
        end_at: Set(request.end_at),
        usage_limit: Set(request.usage_limit),
        used: Set(0),
        active: Set(request.active),
        product_ids: Set(if request.product_ids.is_empty() {
            None
        } else {
            Some(json!(request.product_ids))
        }),
        category_ids: Set(if request.category_ids.is_empty() {
            None
        } else {
            Some(json!(request.category_ids))
        }),
        created_at: Set(chrono::Utc::now().naive_utc()),
    };
    let created = model.insert(conn).await?;
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn make_discount(kind: DiscountKind, value: i64) -> discount::Model {
        discount::Model {
            id: 1,
            code: "SALE10".into(),
            kind,
            value,
            min_order: None,
            start_at: None,
            end_at: None,
            usage_limit: None,
            used: 0,
            active: true,
            product_ids: None,
            category_ids: None,
            created_at: Utc::now().naive_utc(),
        }
    }

    fn line(product_id: i64, category_id: Option<i64>, quantity: i32, unit_price: i64) -> EvalLine {
        EvalLine {
            product_id,
            category_id,
            quantity,
            unit_price,
        }
    }

    #[test]
    fn rules_reject_in_order() {
        let now = Utc::now().naive_utc();

        let mut d = make_discount(DiscountKind::Percent, 10);
        d.active = false;
        assert_eq!(check_rules(&d, 1000, now), Err(DiscountReason::Inactive));

        let mut d = make_discount(DiscountKind::Percent, 10);
        d.start_at = Some(now + Duration::hours(1));
        assert_eq!(check_rules(&d, 1000, now), Err(DiscountReason::NotYetValid));

        let mut d = make_discount(DiscountKind::Percent, 10);
        d.end_at = Some(now - Duration::hours(1));
        assert_eq!(check_rules(&d, 1000, now), Err(DiscountReason::Expired));

        let mut d = make_discount(DiscountKind::Percent, 10);
        d.usage_limit = Some(5);
        d.used = 5;
        assert_eq!(check_rules(&d, 1000, now), Err(DiscountReason::UsageExceeded));

        let mut d = make_discount(DiscountKind::Percent, 10);
        d.min_order = Some(2000);
        assert_eq!(check_rules(&d, 1999, now), Err(DiscountReason::MinimumNotMet));
        assert_eq!(check_rules(&d, 2000, now), Ok(()));
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let now = Utc::now().naive_utc();
        let mut d = make_discount(DiscountKind::Percent, 10);
        d.start_at = Some(now);
        d.end_at = Some(now);
        assert_eq!(check_rules(&d, 1000, now), Ok(()));
    }

    #[test]
    fn empty_scope_covers_all_lines() {
        let d = make_discount(DiscountKind::Percent, 10);
        let lines = vec![line(1, None, 2, 50_000), line(2, Some(9), 1, 30_000)];
        assert_eq!(eligible_total(&d, &lines), 130_000);
    }

    #[test]
    fn scope_filters_by_product_or_category() {
        let mut d = make_discount(DiscountKind::Percent, 10);
        d.product_ids = Some(json!([1]));
        d.category_ids = Some(json!([9]));
        let lines = vec![
            line(1, None, 1, 10_000),     // in by product id
            line(2, Some(9), 1, 20_000),  // in by category id
            line(3, Some(8), 1, 40_000),  // out
            line(4, None, 1, 80_000),     // out
        ];
        assert_eq!(eligible_total(&d, &lines), 30_000);
    }

    #[test]
    fn percent_floors() {
        let d = make_discount(DiscountKind::Percent, 10);
        assert_eq!(discount_total(&d, 100_000), 10_000);
        let d = make_discount(DiscountKind::Percent, 15);
        assert_eq!(discount_total(&d, 999), 149); // 149.85 floors
        let d = make_discount(DiscountKind::Percent, 0);
        assert_eq!(discount_total(&d, 100_000), 0);
    }

    #[test]
    fn fixed_is_flat_and_unclamped() {
        let d = make_discount(DiscountKind::Fixed, 50_000);
        assert_eq!(discount_total(&d, 100_000), 50_000);
        // Deliberately may exceed the eligible total.
        assert_eq!(discount_total(&d, 10_000), 50_000);
    }

    #[test]
    fn codes_normalize_to_uppercase() {
        assert_eq!(normalize_code("  summer10 "), "SUMMER10");
        assert_eq!(normalize_code("SUMMER10"), "SUMMER10");
    }
}
