use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::path::Path;
use tracing::info;

const CONFIG_DIR: &str = "config";
const DEFAULT_ENV: &str = "development";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Top-level application configuration, loaded from `config/*.toml` files
/// layered with `APP__`-prefixed environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Redis connection URL (session cart store)
    pub redis_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Session cart behaviour
    #[serde(default)]
    pub cart: CartConfig,

    /// Payment processor integration
    pub gateway: GatewayConfig,

    /// Outbound notification mail
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CartConfig {
    /// Session cart TTL in seconds
    #[serde(default = "default_cart_ttl_secs")]
    pub ttl_secs: u64,

    /// Subtotals at or above this ship free
    #[serde(default = "default_free_shipping_threshold")]
    pub free_shipping_threshold: Decimal,

    /// Flat fee charged below the free-shipping threshold
    #[serde(default = "default_flat_shipping_fee")]
    pub flat_shipping_fee: Decimal,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cart_ttl_secs(),
            free_shipping_threshold: default_free_shipping_threshold(),
            flat_shipping_fee: default_flat_shipping_fee(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the payment processor's REST API
    pub base_url: String,

    /// Bearer access token for processor calls
    pub access_token: String,

    /// Buyer is sent here after an approved hosted checkout
    pub success_url: String,

    /// Buyer is sent here after a failed hosted checkout
    pub failure_url: String,

    /// Payer identity attached to Pix charges. The default profile is a
    /// sandbox identity; production deployments must override it.
    #[serde(default)]
    pub pix_payer: PixPayerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PixPayerConfig {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// CPF document number, digits only
    pub document: String,
}

impl Default for PixPayerConfig {
    fn default() -> Self {
        Self {
            email: "test_user@testuser.com".to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            document: "19119119100".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_email: String,
    pub from_name: String,
    /// Recipient of the internal new-payment notification
    pub admin_email: String,
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_cart_ttl_secs() -> u64 {
    60 * 60 * 24 * 7
}

fn default_free_shipping_threshold() -> Decimal {
    Decimal::new(150_000, 2)
}

fn default_flat_shipping_fee() -> Decimal {
    Decimal::new(5_000, 2)
}

fn default_smtp_port() -> u16 {
    587
}

impl AppConfig {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Loads configuration for the current `RUN_ENV`/`APP_ENV` profile.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let builder = Config::builder()
        .set_default("database_url", "sqlite://storefront.db?mode=rwc")?
        .set_default("redis_url", "redis://localhost:6379")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", 8080)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("gateway.base_url", "https://api.mercadopago.com")?
        .set_default("gateway.access_token", "TEST-ACCESS-TOKEN")?
        .set_default("gateway.success_url", "http://localhost:8080/checkout/confirmation")?
        .set_default("gateway.failure_url", "http://localhost:8080/checkout/failure")?
        .set_default("mail.smtp_host", "localhost")?
        .set_default("mail.smtp_port", 587)?
        .set_default("mail.smtp_username", "")?
        .set_default("mail.smtp_password", "")?
        .set_default("mail.from_email", "store@example.com")?
        .set_default("mail.from_name", "Storefront")?
        .set_default("mail.admin_email", "admin@example.com")?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"));

    builder.build()?.try_deserialize()
}

/// Initializes the tracing subscriber. JSON output is used when `json` is set,
/// matching the structured-log expectation of production deployments.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("storefront_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::try_new(filter_directive)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}
