//! Push notification dispatch through an external gateway webhook.
//!
//! [`WebhookDispatcher`] POSTs a JSON-encoded reminder payload to a fixed
//! gateway URL (the mobile-push bridge). A send is a single attempt with a
//! bounded timeout; failed sends are not retried, matching the
//! notify-at-most-once delivery policy.

use std::time::Duration;

use async_trait::async_trait;

use crate::dispatch::{DispatchError, NotificationDispatcher, ReminderPayload};

/// Delivers reminder notifications to a push-gateway endpoint.
pub struct WebhookDispatcher {
    client: reqwest::Client,
    url: String,
}

impl WebhookDispatcher {
    /// Create a dispatcher targeting the given gateway URL.
    ///
    /// Per-send timeouts are applied at request time, not on the client, so
    /// the scheduler's configured bound is authoritative.
    pub fn new(url: impl Into<String>) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Read `PUSH_GATEWAY_URL` from the environment; `None` when unset.
    pub fn from_env() -> Option<Result<Self, DispatchError>> {
        std::env::var("PUSH_GATEWAY_URL").ok().map(Self::new)
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookDispatcher {
    fn channel(&self) -> &'static str {
        "webhook"
    }

    async fn send(
        &self,
        payload: &ReminderPayload,
        timeout: Duration,
    ) -> Result<bool, DispatchError> {
        let response = self
            .client
            .post(&self.url)
            .timeout(timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DispatchError::Timeout(timeout)
                } else {
                    DispatchError::Gateway(e)
                }
            })?;

        if !response.status().is_success() {
            return Err(DispatchError::GatewayStatus(response.status().as_u16()));
        }

        tracing::info!(
            lead_id = payload.lead_id,
            interval = %payload.interval_key,
            "Reminder push dispatched to gateway"
        );
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
