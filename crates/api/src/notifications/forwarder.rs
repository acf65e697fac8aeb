//! Signal-bus to WebSocket bridge.

use std::sync::Arc;

use axum::extract::ws::Message;
use leadline_notify::ReminderSignal;
use tokio::sync::broadcast;

use crate::ws::WsManager;

/// Forwards in-app reminder signals to the owner's live connections.
///
/// The scheduler publishes a [`ReminderSignal`] instead of sending an email
/// when the owner is already on the reminders screen; this task turns each
/// signal into a WebSocket push.
pub struct ReminderForwarder {
    ws_manager: Arc<WsManager>,
}

impl ReminderForwarder {
    /// Create a new forwarder over the given WebSocket manager.
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    /// Run the forwarding loop.
    ///
    /// Consumes signals from `receiver` until the channel is closed (i.e.
    /// the [`SignalBus`](leadline_notify::SignalBus) is dropped).
    pub async fn run(self, mut receiver: broadcast::Receiver<ReminderSignal>) {
        loop {
            match receiver.recv().await {
                Ok(signal) => self.forward(signal).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Reminder forwarder lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Signal bus closed, reminder forwarder shutting down");
                    break;
                }
            }
        }
    }

    async fn forward(&self, signal: ReminderSignal) {
        let msg = serde_json::json!({
            "type": "reminder.due",
            "lead_id": signal.lead_id,
            "lead_label": signal.lead_label,
            "due_at": signal.due_at,
            "interval_key": signal.interval_key,
            "interval_label": signal.interval_label,
            "published_at": signal.published_at,
        });
        let sent = self
            .ws_manager
            .send_to_user(signal.owner_user_id, Message::Text(msg.to_string().into()))
            .await;

        if sent == 0 {
            // The owner was on-page at tick time but disconnected since; a
            // stale suppression window this narrow is accepted.
            tracing::debug!(
                owner_user_id = signal.owner_user_id,
                lead_id = signal.lead_id,
                "In-app reminder signal had no live connection to land on"
            );
        }
    }
}
