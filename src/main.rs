use std::{sync::Arc, time::Duration};

use anyhow::Context;
use tokio::{signal, sync::mpsc};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::info;

use storefront_api as api;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db = Arc::new(api::db::establish_connection(&cfg).await?);

    // Redis client for the session cart store (construction only; the
    // connection is established per operation)
    let redis_client = Arc::new(redis::Client::open(cfg.redis_url.clone())?);

    // Init events
    let (event_tx, event_rx) = mpsc::channel(1024);
    let event_sender = api::events::EventSender::new(event_tx);
    tokio::spawn(api::events::process_events(event_rx));

    // Infrastructure seams: session store, payment processor, mail
    let cart_store: Arc<dyn api::cart::store::CartStore> = Arc::new(
        api::cart::store::RedisCartStore::new(redis_client, cfg.cart.ttl_secs),
    );
    let gateway: Arc<dyn api::gateway::PaymentGateway> = Arc::new(
        api::gateway::http::MercadoPagoGateway::new(cfg.gateway.clone()),
    );
    let mailer: Arc<dyn api::services::notifications::Mailer> = Arc::new(
        api::services::notifications::SmtpMailer::from_config(&cfg.mail)
            .context("failed to initialize SMTP mailer")?,
    );

    let services = api::handlers::AppServices::new(
        db.clone(),
        event_sender.clone(),
        cart_store,
        gateway,
        mailer,
        &cfg,
    );

    let addr = cfg.server_addr();
    let state = Arc::new(api::AppState {
        db,
        config: cfg,
        event_sender,
        services,
    });

    let app = api::app_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(Duration::from_secs(30)));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
