use serde::{Deserialize, Serialize};

use crate::entities::{order, order_item};

/// Explicit caller identity, threaded through every operation instead of
/// being read from ambient request state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewer {
    pub user_id: Option<i64>,
    pub admin: bool,
}

impl Viewer {
    pub fn user(user_id: i64) -> Self {
        Self {
            user_id: Some(user_id),
            admin: false,
        }
    }

    pub fn admin() -> Self {
        Self {
            user_id: None,
            admin: true,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Admins see every order; users see their own. Guest orders (no owner)
    /// are admin-only.
    pub fn can_view(&self, owner: Option<i64>) -> bool {
        self.admin || (owner.is_some() && owner == self.user_id)
    }
}

/// Checkout input. `payment_method` arrives as the wire string and is
/// validated against the enum so an unknown method fails with the service's
/// own error rather than a deserialization failure.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub cart_id: String,
    pub shipping_address: String,
    pub payment_method: String,
    pub shipping_fee: i64,
    pub vat_percent: i64,
    #[serde(default)]
    pub discount_code: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub bank_ref: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    #[serde(default)]
    pub admin_notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidateDiscountRequest {
    pub code: String,
    pub cart_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDiscountRequest {
    pub code: String,
    pub kind: String,
    pub value: i64,
    #[serde(default)]
    pub min_order: Option<i64>,
    #[serde(default)]
    pub start_at: Option<chrono::NaiveDateTime>,
    #[serde(default)]
    pub end_at: Option<chrono::NaiveDateTime>,
    #[serde(default)]
    pub usage_limit: Option<i32>,
    #[serde(default)]
    pub product_ids: Vec<i64>,
    #[serde(default)]
    pub category_ids: Vec<i64>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// An order together with its snapshotted lines.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// Response of the standalone validate endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct DiscountValidation {
    pub valid: bool,
    pub code: String,
    pub discount_total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewer_scoping() {
        assert!(Viewer::admin().can_view(Some(5)));
        assert!(Viewer::admin().can_view(None));
        assert!(Viewer::user(5).can_view(Some(5)));
        assert!(!Viewer::user(5).can_view(Some(6)));
        assert!(!Viewer::user(5).can_view(None));
        assert!(!Viewer::anonymous().can_view(Some(5)));
    }

    #[test]
    fn checkout_request_optional_fields_default() {
        let req: CheckoutRequest = serde_json::from_str(
            r#"{
                "cart_id": "c-1",
                "shipping_address": "12 Main St",
                "payment_method": "COD",
                "shipping_fee": 0,
                "vat_percent": 10
            }"#,
        )
        .unwrap();
        assert_eq!(req.discount_code, None);
        assert_eq!(req.notes, None);
        assert_eq!(req.bank_ref, None);
    }
}
