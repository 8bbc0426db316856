use crate::{
    cart::{store::CartStore, CartSnapshot, LineKey, QuantityAction, StoredCart},
    config::CartConfig,
    db::DbPool,
    entities::{coupon, Coupon, CouponModel, Product, ProductVariant},
    errors::ServiceError,
    events::{Event, EventSender},
    services::pricing::{self, PricingResult, PricingService},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Priced view of a session cart, as returned to the storefront.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub pricing: PricingResult,
    pub shipping_quote: Option<Decimal>,
    /// Payable total plus the shipping quote, when one has been requested.
    pub display_total: Decimal,
}

/// Session cart operations. Every mutation loads the stored cart, applies
/// the change, and writes back through the store immediately.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DbPool>,
    store: Arc<dyn CartStore>,
    pricing: Arc<PricingService>,
    event_sender: EventSender,
    config: CartConfig,
}

impl CartService {
    pub fn new(
        db: Arc<DbPool>,
        store: Arc<dyn CartStore>,
        pricing: Arc<PricingService>,
        event_sender: EventSender,
        config: CartConfig,
    ) -> Self {
        Self {
            db,
            store,
            pricing,
            event_sender,
            config,
        }
    }

    /// Adds one unit of a product (and optional variant) to the session
    /// cart. The product must exist; the variant must belong to it.
    #[instrument(skip(self))]
    pub async fn add_line(
        &self,
        session_id: &str,
        product_id: Uuid,
        variant_id: Option<Uuid>,
    ) -> Result<StoredCart, ServiceError> {
        let product = Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        if let Some(variant_id) = variant_id {
            let variant = ProductVariant::find_by_id(variant_id).one(&*self.db).await?;
            if !variant.is_some_and(|v| v.product_id == product.id) {
                return Err(ServiceError::NotFound(format!(
                    "Variant {} not found for product {}",
                    variant_id, product_id
                )));
            }
        }

        let mut cart = self.store.fetch(session_id).await?;
        cart.add_line(LineKey::new(product_id, variant_id));
        self.store.save(session_id, &cart).await?;

        self.event_sender
            .send_or_log(Event::CartLineAdded {
                session_id: session_id.to_string(),
                product_id,
            })
            .await;

        Ok(cart)
    }

    /// Steps a line's quantity up or down; stepping below one removes it.
    #[instrument(skip(self))]
    pub async fn update_line(
        &self,
        session_id: &str,
        key: LineKey,
        action: QuantityAction,
    ) -> Result<StoredCart, ServiceError> {
        let mut cart = self.store.fetch(session_id).await?;
        cart.update_line(key, action);
        self.store.save(session_id, &cart).await?;
        Ok(cart)
    }

    /// Deletes a line if present; no-op otherwise.
    #[instrument(skip(self))]
    pub async fn remove_line(
        &self,
        session_id: &str,
        key: LineKey,
    ) -> Result<StoredCart, ServiceError> {
        let mut cart = self.store.fetch(session_id).await?;
        cart.remove_line(key);
        self.store.save(session_id, &cart).await?;
        Ok(cart)
    }

    /// Applies a coupon to the cart. Codes match case-insensitively; an
    /// unknown, inactive, or expired code clears any previously applied
    /// coupon before failing.
    #[instrument(skip(self))]
    pub async fn apply_coupon(
        &self,
        session_id: &str,
        code: &str,
    ) -> Result<CouponModel, ServiceError> {
        let normalized = code.trim().to_uppercase();
        let found = Coupon::find()
            .filter(coupon::Column::Code.eq(normalized.clone()))
            .one(&*self.db)
            .await?;

        let mut cart = self.store.fetch(session_id).await?;
        match found {
            Some(coupon) if coupon.is_redeemable_at(Utc::now()) => {
                cart.coupon_id = Some(coupon.id);
                self.store.save(session_id, &cart).await?;
                self.event_sender
                    .send_or_log(Event::CouponApplied {
                        session_id: session_id.to_string(),
                        coupon_id: coupon.id,
                    })
                    .await;
                info!(code = %coupon.code, "coupon applied");
                Ok(coupon)
            }
            _ => {
                cart.coupon_id = None;
                self.store.save(session_id, &cart).await?;
                Err(ServiceError::NotFound(format!(
                    "Coupon '{}' is invalid or expired",
                    normalized
                )))
            }
        }
    }

    /// Computes and stores a shipping quote for the cart's current subtotal.
    #[instrument(skip(self))]
    pub async fn quote_shipping(&self, session_id: &str) -> Result<Decimal, ServiceError> {
        let mut cart = self.store.fetch(session_id).await?;
        let priced = self.pricing.price(&cart.snapshot()).await?;
        let quote = pricing::shipping_quote(priced.subtotal, &self.config);
        cart.shipping_quote = Some(quote);
        self.store.save(session_id, &cart).await?;
        Ok(quote)
    }

    /// Typed snapshot of the stored cart, for pricing and checkout.
    pub async fn snapshot(&self, session_id: &str) -> Result<CartSnapshot, ServiceError> {
        Ok(self.store.fetch(session_id).await?.snapshot())
    }

    /// Priced cart view for the storefront.
    pub async fn view(&self, session_id: &str) -> Result<CartView, ServiceError> {
        let snapshot = self.snapshot(session_id).await?;
        let pricing = self.pricing.price(&snapshot).await?;
        let display_total = pricing.total + snapshot.shipping_quote.unwrap_or_default();
        Ok(CartView {
            pricing,
            shipping_quote: snapshot.shipping_quote,
            display_total,
        })
    }

    /// Drops the session's cart.
    #[instrument(skip(self))]
    pub async fn clear(&self, session_id: &str) -> Result<(), ServiceError> {
        self.store.clear(session_id).await?;
        self.event_sender
            .send_or_log(Event::CartCleared {
                session_id: session_id.to_string(),
            })
            .await;
        Ok(())
    }
}
