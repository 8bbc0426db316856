use crate::{
    errors::ApiError,
    handlers::common::{success_response, validate_input},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Creates the router for order lookup and tracking endpoints
pub fn orders_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/tracking", put(set_tracking_code))
}

/// Order detail with line items; the fallback destination when a payment
/// flow fails
async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (order, items) = state.services.orders.get_order(id).await?;
    Ok(success_response(serde_json::json!({
        "order": order,
        "items": items,
    })))
}

/// Order history for a customer, newest first
async fn list_orders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let orders = state
        .services
        .orders
        .list_for_customer(query.customer_id)
        .await?;
    Ok(success_response(orders))
}

/// Attach a carrier tracking code to an order
async fn set_tracking_code(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TrackingRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;
    let order = state
        .services
        .orders
        .set_tracking_code(id, payload.tracking_code)
        .await?;
    Ok(success_response(order))
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub customer_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TrackingRequest {
    #[validate(length(min = 1, message = "Tracking code is required"))]
    pub tracking_code: String,
}
