use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use common::config::BackendConfig;
use http::header;
use std::{error::Error, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::model::{
    CheckoutRequest, CreateDiscountRequest, UpdateStatusRequest, ValidateDiscountRequest, Viewer,
};
use crate::order_store::OrderStore;
use crate::shipping::ProvinceDirectory;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<OrderStore>,
    pub provinces: Arc<ProvinceDirectory>,
}

pub fn initialize_tracing(log_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(log_level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// Caller identity from the auth layer's headers. Auth itself is an
/// external collaborator; by the time a request lands here it carries
/// `x-user-id` / `x-user-role`.
fn viewer_from_headers(headers: &HeaderMap) -> Viewer {
    let user_id = headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<i64>().ok());
    let admin = headers
        .get("x-user-role")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|role| role.eq_ignore_ascii_case("admin"));
    Viewer { user_id, admin }
}

pub fn router(state: AppState, cors_origin: header::HeaderValue) -> Router {
    Router::new()
        .route("/api/orders", post(checkout).get(list_orders))
        .route("/api/orders/{id}", get(get_order))
        .route("/api/orders/{id}/status", patch(update_status))
        .route("/api/orders/{id}/confirm-payment", post(confirm_payment))
        .route("/api/discounts", post(create_discount))
        .route("/api/discounts/validate", post(validate_discount))
        .route("/api/shipping/provinces", get(provinces))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(cors_origin)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn run_backend(
    config: BackendConfig,
    state: AppState,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let cors_origin = config.cors_origin.parse::<header::HeaderValue>()?;
    let app = router(state, cors_origin);

    tracing::info!("Starting backend service at {}", config.server_address);
    let listener = tokio::net::TcpListener::bind(&config.server_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK").into_response()
}

async fn checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CheckoutRequest>,
) -> Response {
    let viewer = viewer_from_headers(&headers);
    match state.store.checkout(&viewer, request).await {
        Ok(order) => (StatusCode::CREATED, Json(order)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "checkout failed");
            e.into_response()
        }
    }
}

async fn list_orders(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let viewer = viewer_from_headers(&headers);
    match state.store.list_orders(&viewer).await {
        Ok(orders) => (StatusCode::OK, Json(orders)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to list orders");
            e.into_response()
        }
    }
}

async fn get_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_id): Path<i64>,
) -> Response {
    let viewer = viewer_from_headers(&headers);
    match state.store.get_order(&viewer, order_id).await {
        Ok(order) => (StatusCode::OK, Json(order)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, order_id, "failed to get order");
            e.into_response()
        }
    }
}

async fn update_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_id): Path<i64>,
    Json(request): Json<UpdateStatusRequest>,
) -> Response {
    let viewer = viewer_from_headers(&headers);
    match state.store.update_status(&viewer, order_id, request).await {
        Ok(order) => (StatusCode::OK, Json(order)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, order_id, "failed to update order status");
            e.into_response()
        }
    }
}

async fn confirm_payment(State(state): State<AppState>, Path(order_id): Path<i64>) -> Response {
    match state.store.confirm_payment(order_id).await {
        Ok(order) => (StatusCode::OK, Json(order)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, order_id, "failed to confirm payment");
            e.into_response()
        }
    }
}

async fn create_discount(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateDiscountRequest>,
) -> Response {
    let viewer = viewer_from_headers(&headers);
    match state.store.create_discount(&viewer, request).await {
        Ok(created) => {
            tracing::info!(code = %created.code, "discount created");
            (StatusCode::CREATED, Json(created)).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to create discount");
            e.into_response()
        }
    }
}

async fn validate_discount(
    State(state): State<AppState>,
    Json(request): Json<ValidateDiscountRequest>,
) -> Response {
    match state.store.validate_discount(request).await {
        Ok(validation) => (StatusCode::OK, Json(validation)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "discount validation failed");
            e.into_response()
        }
    }
}

async fn provinces(State(state): State<AppState>) -> Response {
    match state.provinces.provinces().await {
        Ok(provinces) => (StatusCode::OK, Json(provinces)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to fetch provinces");
            e.into_response()
        }
    }
}
