//! Periodic cleanup of stale presence records.
//!
//! An agent whose browser dies without a Close frame never sends an
//! explicit disconnect; their presence record would otherwise linger
//! forever. This task removes records not seen for the configured
//! staleness threshold. `IsOnPage` already treats such records as offline,
//! so the sweep is about memory hygiene, not correctness.

use std::sync::Arc;
use std::time::Duration;

use leadline_core::presence::PresenceRegistry;
use tokio_util::sync::CancellationToken;

/// Run the presence sweep loop.
///
/// Removes records older than `stale_after` every `interval`. Runs until
/// `cancel` is triggered.
pub async fn run(
    presence: Arc<PresenceRegistry>,
    stale_after: Duration,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        stale_secs = stale_after.as_secs(),
        interval_secs = interval.as_secs(),
        "Presence sweep started"
    );

    let mut timer = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Presence sweep stopping");
                break;
            }
            _ = timer.tick() => {
                let removed = presence.sweep(stale_after).await;
                if removed > 0 {
                    tracing::info!(removed, "Presence sweep: removed stale records");
                } else {
                    tracing::debug!("Presence sweep: nothing stale");
                }
            }
        }
    }
}
