use crate::{errors::ApiError, handlers::common::success_response, AppState};
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for read-only catalog browsing
pub fn products_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_products))
        .route("/:id", get(get_product))
}

/// List products, optionally filtered by a name search term
async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListProductsQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let products = state.services.catalog.list(query.search.as_deref()).await?;
    Ok(success_response(products))
}

/// Product detail with its selectable variants
async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let product = state.services.catalog.get(id).await?;
    Ok(success_response(product))
}

#[derive(Debug, Deserialize)]
pub struct ListProductsQuery {
    pub search: Option<String>,
}
