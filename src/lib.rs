//! Storefront API Library
//!
//! Catalog browsing, session carts with promotional pricing, checkout, and
//! asynchronous payment reconciliation.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod cart;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod handlers;
pub mod services;

use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

/// Assembles the full application router.
pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/products", handlers::products::products_routes())
        .nest("/carts", handlers::carts::carts_routes())
        .nest("/checkout", handlers::checkout::checkout_routes())
        .nest(
            "/orders",
            handlers::orders::orders_routes().merge(handlers::payments::payments_routes()),
        )
        .nest("/webhooks", handlers::webhooks::webhooks_routes())
        .with_state(state)
}
