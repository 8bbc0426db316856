use crate::{
    db::DbPool,
    entities::{
        order, order_item, Customer, Order, OrderItem, OrderModel, OrderStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::pricing::PricingResult,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Shipping details captured at checkout and snapshotted onto the order.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ShippingInfo {
    #[validate(length(min = 1, message = "Shipping address is required"))]
    pub address: String,
}

/// Order persistence and lifecycle. Orders are created once at checkout;
/// afterwards only status transitions and tracking-code updates are allowed.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    event_sender: EventSender,
}

impl OrderService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Materializes a priced cart into an order plus line items, atomically.
    /// Either the order and every item land, or nothing does.
    #[instrument(skip(self, pricing))]
    pub async fn build_order(
        &self,
        customer_id: Uuid,
        pricing: &PricingResult,
        shipping: &ShippingInfo,
    ) -> Result<OrderModel, ServiceError> {
        if pricing.is_empty() {
            return Err(ServiceError::InvalidOperation(
                "Cannot create an order from an empty cart".to_string(),
            ));
        }

        let customer = Customer::find_by_id(customer_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Customer {} not found", customer_id))
            })?;

        let txn = self.db.begin().await?;

        let order_id = Uuid::new_v4();
        let now = Utc::now();
        let order = order::ActiveModel {
            id: Set(order_id),
            customer_id: Set(customer.id),
            contact_name: Set(customer.full_name()),
            contact_email: Set(customer.email.clone()),
            contact_phone: Set(customer.phone.clone()),
            shipping_address: Set(shipping.address.clone()),
            total: Set(pricing.total),
            status: Set(OrderStatus::Pending),
            tracking_code: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let order = order.insert(&txn).await?;

        for line in &pricing.lines {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(Some(line.product_id)),
                product_name: Set(line.product_name.clone()),
                variant_label: Set(line.variant_label.clone()),
                unit_price: Set(line.unit_price),
                quantity: Set(line.quantity as i32),
                created_at: Set(now),
            };
            item.insert(&txn).await?;
        }

        txn.commit().await?;

        self.event_sender.send_or_log(Event::OrderCreated(order_id)).await;
        info!(%order_id, total = %pricing.total, "order created");
        Ok(order)
    }

    /// Loads an order with its items.
    pub async fn get_order(
        &self,
        order_id: Uuid,
    ) -> Result<(OrderModel, Vec<order_item::Model>), ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;
        Ok((order, items))
    }

    /// Order history for one customer, newest first.
    pub async fn list_for_customer(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<OrderModel>, ServiceError> {
        Ok(Order::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Resolves the opaque external reference carried through the payment
    /// gateway back to an order. References that do not parse or match
    /// resolve to `None`; the caller decides whether that is an error.
    pub async fn find_by_external_reference(
        &self,
        external_reference: &str,
    ) -> Result<Option<OrderModel>, ServiceError> {
        let Ok(order_id) = external_reference.parse::<Uuid>() else {
            return Ok(None);
        };
        Ok(Order::find_by_id(order_id).one(&*self.db).await?)
    }

    /// Atomically transitions `pending -> paid`. Returns whether this call
    /// won the transition. The conditional update is the idempotence guard:
    /// concurrent or replayed confirmations cannot fire side effects twice,
    /// and settled orders are never touched.
    #[instrument(skip(self))]
    pub async fn mark_paid_if_pending(&self, order_id: Uuid) -> Result<bool, ServiceError> {
        self.transition_if_pending(order_id, OrderStatus::Paid).await
    }

    /// Atomically transitions `pending -> cancelled`. An order already paid
    /// stays paid.
    #[instrument(skip(self))]
    pub async fn mark_cancelled_if_pending(&self, order_id: Uuid) -> Result<bool, ServiceError> {
        self.transition_if_pending(order_id, OrderStatus::Cancelled)
            .await
    }

    async fn transition_if_pending(
        &self,
        order_id: Uuid,
        to: OrderStatus,
    ) -> Result<bool, ServiceError> {
        let result = Order::update_many()
            .col_expr(order::Column::Status, Expr::value(to))
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .exec(&*self.db)
            .await?;

        let transitioned = result.rows_affected == 1;
        if transitioned {
            info!(%order_id, status = ?to, "order status transitioned");
        }
        Ok(transitioned)
    }

    /// Attaches a carrier tracking code. The only mutation allowed on an
    /// order after creation besides status transitions.
    #[instrument(skip(self))]
    pub async fn set_tracking_code(
        &self,
        order_id: Uuid,
        tracking_code: String,
    ) -> Result<OrderModel, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let mut active: order::ActiveModel = order.into();
        active.tracking_code = Set(Some(tracking_code));
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }
}

/// Creation-time invariant: the order total equals the sum of its item
/// lines minus the discount. Exposed for tests and consistency checks.
pub fn total_matches_items(
    total: Decimal,
    items: &[(Decimal, i32)],
    discount: Decimal,
) -> bool {
    let item_sum: Decimal = items
        .iter()
        .map(|(unit_price, quantity)| *unit_price * Decimal::from(*quantity))
        .sum();
    item_sum - discount == total
}
