//! In-process signal bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`SignalBus`] carries [`ReminderSignal`]s from the scheduler to whoever
//! renders them in-app — in practice the WebSocket forwarder, which pushes
//! each signal to the owning agent's live connections. It is designed to be
//! shared via `Arc<SignalBus>` across the application.

use chrono::{DateTime, Utc};
use leadline_core::types::DbId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// ReminderSignal
// ---------------------------------------------------------------------------

/// A reminder interval that just fired for an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderSignal {
    pub tenant_id: DbId,
    pub lead_id: DbId,
    /// The agent the signal is addressed to.
    pub owner_user_id: DbId,
    /// Short lead summary ("Acme Corp").
    pub lead_label: String,
    /// The absolute time the reminder is for.
    pub due_at: DateTime<Utc>,
    /// Canonical key of the interval that fired ("1h").
    pub interval_key: String,
    /// Display label of the interval that fired ("1 hour before").
    pub interval_label: String,
    /// When the signal was published (UTC).
    pub published_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// SignalBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out bus for in-app reminder signals.
pub struct SignalBus {
    sender: broadcast::Sender<ReminderSignal>,
}

impl SignalBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed signals are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a signal to all current subscribers.
    ///
    /// With no active subscribers the signal is dropped; an in-app signal
    /// nobody can render has nowhere useful to go anyway.
    pub fn publish(&self, signal: ReminderSignal) {
        // Ignore the SendError -- it only means there are zero receivers.
        let _ = self.sender.send(signal);
    }

    /// Subscribe to all signals published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<ReminderSignal> {
        self.sender.subscribe()
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(owner: DbId) -> ReminderSignal {
        ReminderSignal {
            tenant_id: 1,
            lead_id: 42,
            owner_user_id: owner,
            lead_label: "Acme Corp".into(),
            due_at: Utc::now(),
            interval_key: "1h".into(),
            interval_label: "1 hour before".into(),
            published_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = SignalBus::default();
        let mut rx = bus.subscribe();

        bus.publish(signal(7));

        let received = rx.recv().await.expect("should receive the signal");
        assert_eq!(received.owner_user_id, 7);
        assert_eq!(received.interval_key, "1h");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_signal() {
        let bus = SignalBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(signal(9));

        assert_eq!(rx1.recv().await.unwrap().owner_user_id, 9);
        assert_eq!(rx2.recv().await.unwrap().owner_user_id, 9);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = SignalBus::default();
        bus.publish(signal(1));
    }
}
