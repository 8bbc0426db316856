use crate::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

/// Creates the router for inbound processor notifications
pub fn webhooks_routes() -> Router<Arc<AppState>> {
    Router::new().route("/payments", post(payment_webhook))
}

/// Query parameters of a processor notification. The processor sends either
/// `topic`/`id` or `type`/`data.id` depending on the notification channel;
/// both spellings are accepted.
#[derive(Debug, Deserialize)]
pub struct PaymentNotificationParams {
    pub topic: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub id: Option<String>,
    #[serde(rename = "data.id")]
    pub data_id: Option<String>,
}

impl PaymentNotificationParams {
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref().or(self.kind.as_deref())
    }

    pub fn resource_id(&self) -> Option<&str> {
        self.id.as_deref().or(self.data_id.as_deref())
    }
}

/// POST /webhooks/payments
///
/// Always acknowledges with 200: a non-success response would make the
/// processor re-deliver, and reconciliation failures are handled by logging
/// plus the processor's own periodic retries. Never propagate an error here.
async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaymentNotificationParams>,
) -> impl IntoResponse {
    match state
        .services
        .reconciler
        .handle_notification(params.topic(), params.resource_id())
        .await
    {
        Ok(outcome) => {
            info!(action = ?outcome.action, "payment notification processed");
        }
        Err(e) => {
            error!("payment notification processing failed: {}", e);
        }
    }

    (StatusCode::OK, "ok")
}
