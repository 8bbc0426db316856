use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted by the cart, checkout, and reconciliation flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    CartLineAdded {
        session_id: String,
        product_id: Uuid,
    },
    CartCleared {
        session_id: String,
    },
    CouponApplied {
        session_id: String,
        coupon_id: Uuid,
    },
    OrderCreated(Uuid),
    HostedCheckoutCreated {
        order_id: Uuid,
        preference_id: String,
    },
    PixChargeCreated {
        order_id: Uuid,
    },
    OrderPaid(Uuid),
    OrderCancelled(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging (not propagating) channel failures. Domain
    /// events are observability signals here, never control flow.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Dropping event: {}", e);
        }
    }
}

/// Background consumer for the event channel. Events are currently logged;
/// this is the seam where outbound integrations would attach.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderPaid(order_id) => info!(%order_id, "event: order paid"),
            Event::OrderCancelled(order_id) => info!(%order_id, "event: order cancelled"),
            Event::OrderCreated(order_id) => info!(%order_id, "event: order created"),
            other => info!(event = ?other, "event"),
        }
    }
    info!("Event channel closed; processor exiting");
}
