pub mod carts;
pub mod checkout;
pub mod common;
pub mod orders;
pub mod payments;
pub mod products;
pub mod webhooks;

use crate::{
    cart::store::CartStore,
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    gateway::PaymentGateway,
    services::{
        carts::CartService, catalog::CatalogService, checkout::CheckoutService,
        notifications::Mailer, orders::OrderService, pricing::PricingService,
        reconciler::WebhookReconciler,
    },
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub cart: Arc<CartService>,
    pub pricing: Arc<PricingService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub reconciler: Arc<WebhookReconciler>,
}

impl AppServices {
    /// Builds the service graph. The cart store, gateway, and mailer come in
    /// as trait objects so deployments and tests choose the implementations.
    pub fn new(
        db: Arc<DbPool>,
        event_sender: EventSender,
        cart_store: Arc<dyn CartStore>,
        gateway: Arc<dyn PaymentGateway>,
        mailer: Arc<dyn Mailer>,
        config: &AppConfig,
    ) -> Self {
        let catalog = Arc::new(CatalogService::new(db.clone()));
        let pricing = Arc::new(PricingService::new(db.clone()));
        let cart = Arc::new(CartService::new(
            db.clone(),
            cart_store,
            pricing.clone(),
            event_sender.clone(),
            config.cart.clone(),
        ));
        let orders = Arc::new(OrderService::new(db, event_sender.clone()));
        let checkout = Arc::new(CheckoutService::new(
            cart.clone(),
            pricing.clone(),
            orders.clone(),
        ));
        let reconciler = Arc::new(WebhookReconciler::new(
            orders.clone(),
            gateway.clone(),
            mailer,
            config.mail.admin_email.clone(),
            event_sender,
        ));

        Self {
            catalog,
            cart,
            pricing,
            checkout,
            orders,
            gateway,
            reconciler,
        }
    }
}
