use crate::{config::MailConfig, entities::OrderModel, errors::ServiceError};
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Serialize;
use tracing::instrument;

/// A single outbound notification message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Outbound mail seam. The reconciler depends on this trait so tests can
/// observe exactly which messages a transition produced.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), ServiceError>;
}

/// Delivery report for the pair of paid-order notifications. Failures are
/// recorded, never propagated: mail must not roll back a payment.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NotificationOutcome {
    pub admin_error: Option<String>,
    pub customer_error: Option<String>,
}

impl NotificationOutcome {
    pub fn all_delivered(&self) -> bool {
        self.admin_error.is_none() && self.customer_error.is_none()
    }
}

/// SMTP implementation over lettre's async transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn from_config(config: &MailConfig) -> Result<Self, ServiceError> {
        let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| {
                ServiceError::NotificationError(format!("failed to create SMTP transport: {}", e))
            })?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        Ok(Self {
            transport,
            from: format!("{} <{}>", config.from_name, config.from_email),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    #[instrument(skip(self, message), fields(to = %message.to, subject = %message.subject))]
    async fn send(&self, message: EmailMessage) -> Result<(), ServiceError> {
        let email = Message::builder()
            .from(self.from.parse().map_err(|e| {
                ServiceError::NotificationError(format!("invalid from address: {}", e))
            })?)
            .to(message.to.parse().map_err(|e| {
                ServiceError::NotificationError(format!("invalid to address: {}", e))
            })?)
            .subject(&message.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(message.body)
            .map_err(|e| ServiceError::NotificationError(format!("failed to build email: {}", e)))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| ServiceError::NotificationError(format!("smtp send failed: {}", e)))?;
        Ok(())
    }
}

/// Internal heads-up that an order was paid.
pub fn order_paid_admin_email(admin_email: &str, order: &OrderModel) -> EmailMessage {
    EmailMessage {
        to: admin_email.to_string(),
        subject: format!("Payment confirmed for order {}", order.id),
        body: format!(
            "Order {} from {} ({}) was confirmed as paid.\nTotal: {}\nShip to: {}\n",
            order.id, order.contact_name, order.contact_email, order.total, order.shipping_address
        ),
    }
}

/// Buyer-facing payment confirmation.
pub fn order_paid_customer_email(order: &OrderModel) -> EmailMessage {
    EmailMessage {
        to: order.contact_email.clone(),
        subject: "Your payment was confirmed".to_string(),
        body: format!(
            "Hi {},\n\nWe received your payment for order {}.\nTotal: {}\n\nWe will let you know as soon as it ships.\n",
            order.contact_name, order.id, order.total
        ),
    }
}
