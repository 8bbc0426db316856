#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, Schema, Set};
use std::collections::HashMap;
use std::sync::Mutex;
use storefront_api::{
    config::{AppConfig, CartConfig, GatewayConfig, MailConfig, PixPayerConfig},
    entities::{self, coupon, customer, product, product_variant},
    errors::ServiceError,
    events::EventSender,
    gateway::{HostedCheckout, PaymentGateway, PaymentLookup, PixCharge},
    services::notifications::{EmailMessage, Mailer},
};
use uuid::Uuid;

/// Configuration for in-process test apps. External endpoints point at
/// addresses nothing listens on; tests stub the seams instead.
pub fn test_app_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        redis_url: "redis://localhost:6379".to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: "test".to_string(),
        log_level: "info".to_string(),
        log_json: false,
        cart: CartConfig::default(),
        gateway: GatewayConfig {
            base_url: "https://gateway.test".to_string(),
            access_token: "TEST".to_string(),
            success_url: "https://store.test/confirmation".to_string(),
            failure_url: "https://store.test/failure".to_string(),
            pix_payer: PixPayerConfig::default(),
        },
        mail: MailConfig {
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_email: "store@example.com".to_string(),
            from_name: "Storefront".to_string(),
            admin_email: "ops@example.com".to_string(),
        },
    }
}

/// Fresh in-memory database with the schema derived from the entities.
pub async fn test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("sqlite in-memory connection");
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let statements = [
        schema.create_table_from_entity(entities::Product),
        schema.create_table_from_entity(entities::ProductVariant),
        schema.create_table_from_entity(entities::Customer),
        schema.create_table_from_entity(entities::Coupon),
        schema.create_table_from_entity(entities::Order),
        schema.create_table_from_entity(entities::OrderItem),
    ];
    for statement in statements {
        db.execute(backend.build(&statement))
            .await
            .expect("create table");
    }
    db
}

/// Event sender whose receiver is drained in the background.
pub fn test_event_sender() -> EventSender {
    let (tx, mut rx) = tokio::sync::mpsc::channel(64);
    tokio::spawn(async move { while rx.recv().await.is_some() {} });
    EventSender::new(tx)
}

pub async fn seed_product(
    db: &DatabaseConnection,
    name: &str,
    price: Decimal,
    promo: bool,
) -> entities::ProductModel {
    let now = Utc::now();
    product::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        description: Set(None),
        price: Set(price),
        promo_buy_one_get_two: Set(promo),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("seed product")
}

pub async fn seed_variant(
    db: &DatabaseConnection,
    product_id: Uuid,
    label: &str,
    price_delta: Decimal,
) -> entities::ProductVariantModel {
    let now = Utc::now();
    product_variant::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        label: Set(label.to_string()),
        price_delta: Set(price_delta),
        position: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("seed variant")
}

pub async fn seed_customer(db: &DatabaseConnection) -> entities::CustomerModel {
    let now = Utc::now();
    customer::ActiveModel {
        id: Set(Uuid::new_v4()),
        first_name: Set("Ana".to_string()),
        last_name: Set("Souza".to_string()),
        email: Set(format!("ana+{}@example.com", Uuid::new_v4())),
        phone: Set(Some("+55 41 99999-0000".to_string())),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("seed customer")
}

pub async fn seed_coupon(
    db: &DatabaseConnection,
    code: &str,
    percent: Decimal,
    active: bool,
) -> entities::CouponModel {
    let now = Utc::now();
    coupon::ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set(code.to_string()),
        discount_percent: Set(percent),
        active: Set(active),
        valid_from: Set(now - Duration::days(1)),
        valid_to: Set(now + Duration::days(1)),
        created_at: Set(now),
    }
    .insert(db)
    .await
    .expect("seed coupon")
}

/// Gateway double with programmable payment lookups. Creation calls return
/// canned values unless the stub is told to fail them; lookups resolve from
/// the configured map.
#[derive(Default)]
pub struct StubGateway {
    payments: Mutex<HashMap<String, PaymentLookup>>,
    fail_creations: std::sync::atomic::AtomicBool,
}

impl StubGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_payment(&self, payment_id: &str, lookup: PaymentLookup) {
        self.payments
            .lock()
            .unwrap()
            .insert(payment_id.to_string(), lookup);
    }

    /// Makes every subsequent creation call fail like a processor outage.
    pub fn fail_creations(&self) {
        self.fail_creations
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    fn creation_result<T>(&self, value: T) -> Result<T, ServiceError> {
        if self.fail_creations.load(std::sync::atomic::Ordering::SeqCst) {
            Err(ServiceError::GatewayError(
                "processor unavailable".to_string(),
            ))
        } else {
            Ok(value)
        }
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_hosted_checkout(
        &self,
        order: &entities::OrderModel,
        _items: &[entities::OrderItemModel],
    ) -> Result<HostedCheckout, ServiceError> {
        self.creation_result(HostedCheckout {
            preference_id: format!("pref-{}", order.id),
            redirect_url: format!("https://gateway.test/checkout/{}", order.id),
        })
    }

    async fn create_pix_payment(
        &self,
        order: &entities::OrderModel,
    ) -> Result<PixCharge, ServiceError> {
        self.creation_result(PixCharge {
            copy_paste_code: format!("pix-code-{}", order.id),
            qr_image_base64: "aGVsbG8=".to_string(),
        })
    }

    async fn get_payment(&self, payment_id: &str) -> Result<PaymentLookup, ServiceError> {
        self.payments
            .lock()
            .unwrap()
            .get(payment_id)
            .cloned()
            .ok_or_else(|| {
                ServiceError::GatewayError(format!("payment {} not found", payment_id))
            })
    }
}

/// Mailer double that records every message and can be told to fail
/// deliveries to a specific address.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<EmailMessage>>,
    fail_for: Mutex<Option<String>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_deliveries_to(&self, address: &str) {
        *self.fail_for.lock().unwrap() = Some(address.to_string());
    }

    pub fn sent_messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), ServiceError> {
        if self
            .fail_for
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|addr| addr == message.to)
        {
            return Err(ServiceError::NotificationError(format!(
                "delivery to {} refused",
                message.to
            )));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}
