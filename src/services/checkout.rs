use crate::{
    entities::OrderModel,
    errors::ServiceError,
    services::{carts::CartService, orders::{OrderService, ShippingInfo}, pricing::PricingService},
};
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

/// Orchestrates checkout submission: snapshot the session cart, price it,
/// materialize the order, clear the cart.
#[derive(Clone)]
pub struct CheckoutService {
    cart: Arc<CartService>,
    pricing: Arc<PricingService>,
    orders: Arc<OrderService>,
}

impl CheckoutService {
    pub fn new(
        cart: Arc<CartService>,
        pricing: Arc<PricingService>,
        orders: Arc<OrderService>,
    ) -> Self {
        Self {
            cart,
            pricing,
            orders,
        }
    }

    /// Submits a checkout for an authenticated customer. The order and its
    /// items persist atomically; the session cart is cleared afterwards so a
    /// refresh cannot create the order twice.
    #[instrument(skip(self, shipping))]
    pub async fn submit(
        &self,
        session_id: &str,
        customer_id: Uuid,
        shipping: ShippingInfo,
    ) -> Result<OrderModel, ServiceError> {
        let snapshot = self.cart.snapshot(session_id).await?;
        if snapshot.is_empty() {
            return Err(ServiceError::InvalidOperation(
                "Cannot check out an empty cart".to_string(),
            ));
        }

        let pricing = self.pricing.price(&snapshot).await?;
        let order = self
            .orders
            .build_order(customer_id, &pricing, &shipping)
            .await?;

        // The order exists at this point; a session-store hiccup must not
        // fail the purchase. Worst case the buyer sees a stale cart.
        if let Err(e) = self.cart.clear(session_id).await {
            warn!(order_id = %order.id, "failed to clear cart after checkout: {}", e);
        }

        Ok(order)
    }
}
