//! Notification dispatch contract and payload rendering.
//!
//! [`NotificationDispatcher`] is the seam between the scheduler and the
//! outside world: SMTP in production, a push gateway where one is
//! configured, a recording double in tests. Implementations must bound
//! each send with the given timeout so one slow delivery cannot stall a
//! whole tick.

use std::time::Duration;

use async_trait::async_trait;
use leadline_core::types::{DbId, Timestamp};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for notification delivery failures.
///
/// The scheduler treats every variant the same way: log and move on. The
/// interval is already marked fired by the time a dispatcher runs, so a
/// failed send is a missed notification, never a duplicate.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),

    /// The push gateway request failed (network, DNS, TLS, etc.).
    #[error("Push gateway request failed: {0}")]
    Gateway(#[from] reqwest::Error),

    /// The push gateway answered with a non-2xx status.
    #[error("Push gateway returned HTTP {0}")]
    GatewayStatus(u16),

    /// The send did not complete within the allowed time.
    #[error("Dispatch timed out after {0:?}")]
    Timeout(Duration),
}

// ---------------------------------------------------------------------------
// ReminderPayload
// ---------------------------------------------------------------------------

/// Everything a dispatcher needs to render one reminder notification.
#[derive(Debug, Clone, Serialize)]
pub struct ReminderPayload {
    pub tenant_id: DbId,
    pub lead_id: DbId,
    /// Short lead summary ("Acme Corp").
    pub lead_label: String,
    pub owner_user_id: DbId,
    /// Resolved recipient address: the owner's email, or the tenant's
    /// fallback notification address.
    pub recipient: String,
    /// The absolute time the reminder is for.
    pub due_at: Timestamp,
    /// Display label of the interval that fired ("1 hour before").
    pub interval_label: String,
    /// Canonical key of the interval that fired ("1h").
    pub interval_key: String,
}

impl ReminderPayload {
    /// Subject line for email-shaped channels.
    pub fn subject(&self) -> String {
        format!("[Leadline] Reminder: {} ({})", self.lead_label, self.interval_label)
    }

    /// Plain-text body shared by all external channels.
    pub fn body(&self) -> String {
        format!(
            "Lead: {}\nDue: {}\nNotice: {}\n\nOpen the lead in Leadline to follow up.",
            self.lead_label,
            self.due_at.format("%Y-%m-%d %H:%M UTC"),
            self.interval_label,
        )
    }
}

// ---------------------------------------------------------------------------
// NotificationDispatcher
// ---------------------------------------------------------------------------

/// Sends one rendered reminder notification out of process.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Channel name for logs and tick summaries (`"email"`, `"webhook"`).
    fn channel(&self) -> &'static str;

    /// Attempt a single delivery, bounded by `timeout`.
    ///
    /// Returns `Ok(true)` when the transport accepted the message,
    /// `Ok(false)` when the channel is configured off (nothing was sent,
    /// by design), and `Err` on any failure. Callers never retry.
    async fn send(
        &self,
        payload: &ReminderPayload,
        timeout: Duration,
    ) -> Result<bool, DispatchError>;
}

// ---------------------------------------------------------------------------
// LogDispatcher
// ---------------------------------------------------------------------------

/// Development fallback when neither SMTP nor a push gateway is configured.
///
/// Logs the would-be notification and reports `Ok(false)` so tick summaries
/// show the miss instead of a phantom delivery.
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    fn channel(&self) -> &'static str {
        "log"
    }

    async fn send(
        &self,
        payload: &ReminderPayload,
        _timeout: Duration,
    ) -> Result<bool, DispatchError> {
        tracing::info!(
            lead_id = payload.lead_id,
            recipient = %payload.recipient,
            interval = %payload.interval_key,
            "No external channel configured; reminder notification logged only"
        );
        Ok(false)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
