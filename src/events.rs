use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the core after successful mutations.
///
/// Consumers (email, dashboards) are fire-and-forget collaborators: the
/// core never blocks on or retries delivery, so every send site goes
/// through [`EventSender::send_or_log`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Cart events
    CartItemAdded {
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    },
    CartItemUpdated {
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    },
    CartItemRemoved {
        user_id: Uuid,
        product_id: Uuid,
    },

    // Order events
    OrderCreated(Uuid),
    OrderSuperseded(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },

    // Payment events
    PaymentCaptured(Uuid),

    // Review events
    ReviewCreated(Uuid),

    // Identity events
    UserRegistered {
        user_id: Uuid,
        store_id: Option<Uuid>,
    },
    SessionCreated(Uuid),

    /// Outbound notification request (email etc.), handled off the
    /// request path by whatever consumer is attached.
    Notify {
        user_id: Uuid,
        message: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, surfacing the failure to the caller.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event and only logs on failure. Used on every mutation
    /// path: a full event channel must never fail a committed request.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Dropping event: {}", e);
        }
    }
}

/// Drains the event channel, logging each event. Stands in for the
/// notification/dashboard consumers, which are outside the core.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        info!(?event, "event processed");
    }
    info!("event channel closed");
}
