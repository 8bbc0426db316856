use crate::{
    cart::{LineKey, QuantityAction},
    errors::ApiError,
    handlers::common::{no_content_response, success_response, validate_input},
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Creates the router for session cart endpoints
pub fn carts_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:session_id", get(view_cart))
        .route("/:session_id/items", post(add_line))
        .route("/:session_id/items/:key", put(update_line))
        .route("/:session_id/items/:key", delete(remove_line))
        .route("/:session_id/coupon", post(apply_coupon))
        .route("/:session_id/shipping-quote", post(quote_shipping))
        .route("/:session_id/clear", post(clear_cart))
}

fn parse_line_key(raw: &str) -> Result<LineKey, ApiError> {
    LineKey::parse(raw)
        .ok_or_else(|| ApiError::BadRequest(format!("Malformed cart line key '{}'", raw)))
}

/// Priced view of the session cart
async fn view_cart(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let view = state.services.cart.view(&session_id).await?;
    Ok(success_response(view))
}

/// Add one unit of a product/variant to the cart
async fn add_line(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(payload): Json<AddLineRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let cart = state
        .services
        .cart
        .add_line(&session_id, payload.product_id, payload.variant_id)
        .await?;
    Ok(success_response(cart))
}

/// Step a line's quantity up or down
async fn update_line(
    State(state): State<Arc<AppState>>,
    Path((session_id, key)): Path<(String, String)>,
    Json(payload): Json<UpdateLineRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let key = parse_line_key(&key)?;
    let cart = state
        .services
        .cart
        .update_line(&session_id, key, payload.action)
        .await?;
    Ok(success_response(cart))
}

/// Remove a line from the cart
async fn remove_line(
    State(state): State<Arc<AppState>>,
    Path((session_id, key)): Path<(String, String)>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let key = parse_line_key(&key)?;
    state.services.cart.remove_line(&session_id, key).await?;
    Ok(no_content_response())
}

/// Apply a coupon code to the cart
async fn apply_coupon(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(payload): Json<ApplyCouponRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;
    let coupon = state
        .services
        .cart
        .apply_coupon(&session_id, &payload.code)
        .await?;
    Ok(success_response(coupon))
}

/// Compute and store a shipping quote for the cart
async fn quote_shipping(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let quote = state.services.cart.quote_shipping(&session_id).await?;
    Ok(success_response(serde_json::json!({ "shipping_quote": quote })))
}

/// Drop the session cart
async fn clear_cart(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state.services.cart.clear(&session_id).await?;
    Ok(no_content_response())
}

// Request DTOs

#[derive(Debug, Deserialize)]
pub struct AddLineRequest {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLineRequest {
    pub action: QuantityAction,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ApplyCouponRequest {
    #[validate(length(min = 1, message = "Coupon code is required"))]
    pub code: String,
}
