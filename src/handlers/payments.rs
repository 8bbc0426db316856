use crate::{errors::ApiError, handlers::common::success_response, AppState};
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    routing::post,
    Router,
};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Creates the router for payment creation endpoints, nested under /orders
pub fn payments_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:id/payments/hosted-checkout", post(create_hosted_checkout))
        .route("/:id/payments/pix", post(create_pix_payment))
}

/// A processor failure never bubbles up as a raw error page: the buyer is
/// sent back to the order detail, which offers a retry.
fn order_detail_fallback(order_id: Uuid) -> Response {
    Redirect::to(&format!("/orders/{}", order_id)).into_response()
}

/// Create a processor-hosted checkout session for the order
async fn create_hosted_checkout(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let (order, items) = state.services.orders.get_order(id).await?;

    match state
        .services
        .gateway
        .create_hosted_checkout(&order, &items)
        .await
    {
        Ok(checkout) => Ok(success_response(checkout)),
        Err(e) => {
            warn!(order_id = %id, "hosted checkout creation failed, falling back to order detail: {}", e);
            Ok(order_detail_fallback(id))
        }
    }
}

/// Create a Pix charge (copy-paste code + QR image) for the order
async fn create_pix_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let (order, _) = state.services.orders.get_order(id).await?;

    match state.services.gateway.create_pix_payment(&order).await {
        Ok(charge) => Ok(success_response(charge)),
        Err(e) => {
            warn!(order_id = %id, "pix creation failed, falling back to order detail: {}", e);
            Ok(order_detail_fallback(id))
        }
    }
}
