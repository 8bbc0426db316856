use crate::{
    entities::OrderModel,
    errors::ServiceError,
    events::{Event, EventSender},
    gateway::{GatewayPaymentStatus, PaymentGateway},
    services::{
        notifications::{
            order_paid_admin_email, order_paid_customer_email, Mailer, NotificationOutcome,
        },
        orders::OrderService,
    },
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// What a notification ended up doing. Terminal for observability and tests;
/// the HTTP layer collapses every variant into a 200 acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileAction {
    /// Topic was not `payment`; nothing to do.
    SkippedTopic,
    /// Notification carried no resource id.
    MissingResourceId,
    /// The payment's external reference matched no order.
    UnknownOrder,
    /// This request won the `pending -> paid` transition.
    MarkedPaid,
    /// This request won the `pending -> cancelled` transition.
    MarkedCancelled,
    /// The order was already in a terminal state; no transition, no side
    /// effects. Duplicate and replayed notifications land here.
    AlreadySettled,
    /// Processor status this service takes no action on.
    NoActionableStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutcome {
    pub action: ReconcileAction,
    /// Present only when this request performed the paid transition.
    pub notifications: Option<NotificationOutcome>,
}

impl ReconcileOutcome {
    fn from_action(action: ReconcileAction) -> Self {
        Self {
            action,
            notifications: None,
        }
    }
}

/// Applies asynchronous payment notifications to order state.
///
/// The processor may deliver the same notification more than once,
/// concurrently, and out of order. Safety rests on two rules: the reported
/// status is always re-fetched from the gateway rather than trusted from the
/// callback, and every transition goes through the order service's
/// compare-and-set so only one delivery can win it.
pub struct WebhookReconciler {
    orders: Arc<OrderService>,
    gateway: Arc<dyn PaymentGateway>,
    mailer: Arc<dyn Mailer>,
    admin_email: String,
    event_sender: EventSender,
}

impl WebhookReconciler {
    pub fn new(
        orders: Arc<OrderService>,
        gateway: Arc<dyn PaymentGateway>,
        mailer: Arc<dyn Mailer>,
        admin_email: String,
        event_sender: EventSender,
    ) -> Self {
        Self {
            orders,
            gateway,
            mailer,
            admin_email,
            event_sender,
        }
    }

    /// Processes one notification. Errors are infrastructure failures
    /// (gateway or database); the HTTP handler logs them and still
    /// acknowledges with 200.
    #[instrument(skip(self))]
    pub async fn handle_notification(
        &self,
        topic: Option<&str>,
        resource_id: Option<&str>,
    ) -> Result<ReconcileOutcome, ServiceError> {
        if topic != Some("payment") {
            return Ok(ReconcileOutcome::from_action(ReconcileAction::SkippedTopic));
        }
        let Some(resource_id) = resource_id else {
            warn!("payment notification without a resource id");
            return Ok(ReconcileOutcome::from_action(ReconcileAction::MissingResourceId));
        };

        let payment = self.gateway.get_payment(resource_id).await?;

        let order = match &payment.external_reference {
            Some(reference) => self.orders.find_by_external_reference(reference).await?,
            None => None,
        };
        let Some(order) = order else {
            warn!(
                resource_id,
                external_reference = ?payment.external_reference,
                "payment notification matched no order"
            );
            return Ok(ReconcileOutcome::from_action(ReconcileAction::UnknownOrder));
        };

        match payment.status {
            GatewayPaymentStatus::Approved => self.settle_paid(order).await,
            GatewayPaymentStatus::Rejected | GatewayPaymentStatus::Cancelled => {
                let transitioned = self.orders.mark_cancelled_if_pending(order.id).await?;
                if transitioned {
                    self.event_sender.send_or_log(Event::OrderCancelled(order.id)).await;
                    Ok(ReconcileOutcome::from_action(ReconcileAction::MarkedCancelled))
                } else {
                    info!(order_id = %order.id, "cancellation ignored; order already settled");
                    Ok(ReconcileOutcome::from_action(ReconcileAction::AlreadySettled))
                }
            }
            _ => Ok(ReconcileOutcome::from_action(ReconcileAction::NoActionableStatus)),
        }
    }

    /// Confirms payment. Emails fire only when this request won the
    /// transition, which bounds them to at most one pair per order.
    async fn settle_paid(&self, order: OrderModel) -> Result<ReconcileOutcome, ServiceError> {
        let transitioned = self.orders.mark_paid_if_pending(order.id).await?;
        if !transitioned {
            info!(order_id = %order.id, "payment confirmation replayed; order already settled");
            return Ok(ReconcileOutcome::from_action(ReconcileAction::AlreadySettled));
        }

        self.event_sender.send_or_log(Event::OrderPaid(order.id)).await;

        let mut notifications = NotificationOutcome::default();
        if let Err(e) = self
            .mailer
            .send(order_paid_admin_email(&self.admin_email, &order))
            .await
        {
            error!(order_id = %order.id, "admin notification failed: {}", e);
            notifications.admin_error = Some(e.to_string());
        }
        if let Err(e) = self.mailer.send(order_paid_customer_email(&order)).await {
            error!(order_id = %order.id, "customer notification failed: {}", e);
            notifications.customer_error = Some(e.to_string());
        }

        info!(order_id = %order.id, delivered = notifications.all_delivered(), "order marked paid");
        Ok(ReconcileOutcome {
            action: ReconcileAction::MarkedPaid,
            notifications: Some(notifications),
        })
    }
}
