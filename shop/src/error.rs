use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::discount::DiscountReason;

pub type Result<T> = std::result::Result<T, ShopError>;

/// Service-level error taxonomy. Every variant maps to one HTTP status and
/// serializes as a `{message, statusCode}` payload; an operation either
/// fully commits or fails with exactly one of these.
#[derive(Debug, Error)]
pub enum ShopError {
    #[error("cart is empty")]
    EmptyCart,
    #[error("invalid payment method: {0}")]
    InvalidPaymentMethod(String),
    #[error("invalid order status: {0}")]
    InvalidStatus(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("order {0} is already paid")]
    AlreadyPaid(i64),
    #[error(
        "insufficient stock for {sku}: {available} available, {requested} requested"
    )]
    InsufficientStock {
        sku: String,
        product_id: i64,
        variant_id: Option<i64>,
        available: i32,
        requested: i32,
    },
    #[error("{0}")]
    DiscountRejected(DiscountReason),
    #[error("forbidden")]
    Forbidden,
    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
}

impl ShopError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::EmptyCart
            | Self::InvalidPaymentMethod(_)
            | Self::InvalidStatus(_)
            | Self::Validation(_)
            | Self::InsufficientStock { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadyPaid(_) => StatusCode::CONFLICT,
            Self::DiscountRejected(DiscountReason::NotFound) => StatusCode::NOT_FOUND,
            Self::DiscountRejected(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Db(_) | Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ShopError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "message": self.to_string(),
            "statusCode": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(ShopError::EmptyCart.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ShopError::NotFound("order 7".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ShopError::AlreadyPaid(7).status_code(), StatusCode::CONFLICT);
        assert_eq!(ShopError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ShopError::DiscountRejected(DiscountReason::NotFound).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ShopError::DiscountRejected(DiscountReason::Expired).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn insufficient_stock_names_the_line() {
        let err = ShopError::InsufficientStock {
            sku: "TEE-RED-M".into(),
            product_id: 1,
            variant_id: Some(3),
            available: 1,
            requested: 2,
        };
        let message = err.to_string();
        assert!(message.contains("TEE-RED-M"));
        assert!(message.contains("1 available"));
        assert!(message.contains("2 requested"));
    }
}
