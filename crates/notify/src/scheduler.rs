//! Reminder notification scheduler.
//!
//! [`ReminderScheduler`] runs as a background task. On every tick it loads
//! the pending reminders inside the lookahead horizon, works out which
//! configured lead-time intervals became due since the last pass, marks
//! each one fired with a per-record compare-and-swap, and only then
//! delivers: an in-app signal when the owning agent is already looking at
//! the reminders screen, an external notification otherwise.
//!
//! Delivery policy is notify-at-most-once, occasionally-miss. The mark is
//! committed before any send, so a crash, a replayed tick, or a failed
//! dispatch can drop a notification but never duplicate one. Duplicate
//! reminder emails erode trust faster than an occasional missed one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use leadline_core::presence::PresenceRegistry;
use leadline_core::reminder::{due_intervals, is_exhausted, LeadReminder};
use leadline_core::timeline::{ReminderInterval, ReminderTimeline};
use leadline_core::types::{DbId, Timestamp};
use tokio_util::sync::CancellationToken;

use crate::bus::{ReminderSignal, SignalBus};
use crate::dispatch::{NotificationDispatcher, ReminderPayload};
use crate::store::{ReminderStore, TimelineStore};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Default seconds between scheduler ticks.
const DEFAULT_TICK_SECS: u64 = 60;

/// Default firing window: how late a missed tick may still fire an
/// interval. Ticks slower than this risk silent misses.
const DEFAULT_WINDOW_SECS: u64 = 300;

/// Default guard added to the load horizon to cover scheduler downtime.
const DEFAULT_GUARD_SECS: u64 = 3600;

/// Default bound on a single external send.
const DEFAULT_DISPATCH_TIMEOUT_SECS: u64 = 10;

/// Default number of concurrent record-processing partitions.
const DEFAULT_WORKERS: usize = 4;

/// Tunables for the scheduler loop, loaded from the environment.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Period between ticks.
    pub tick: Duration,
    /// Firing window per interval.
    pub window: Duration,
    /// Extra lookahead past the longest configured lead time.
    pub guard: Duration,
    /// Bound on one `NotificationDispatcher::send` call.
    pub dispatch_timeout: Duration,
    /// Number of partitions records are hashed into per tick.
    pub workers: usize,
}

impl SchedulerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default |
    /// |--------------------------|---------|
    /// | `SCHEDULER_TICK_SECS`    | `60`    |
    /// | `SCHEDULER_WINDOW_SECS`  | `300`   |
    /// | `SCHEDULER_GUARD_SECS`   | `3600`  |
    /// | `DISPATCH_TIMEOUT_SECS`  | `10`    |
    /// | `SCHEDULER_WORKERS`      | `4`     |
    pub fn from_env() -> Self {
        Self {
            tick: Duration::from_secs(env_u64("SCHEDULER_TICK_SECS", DEFAULT_TICK_SECS)),
            window: Duration::from_secs(env_u64("SCHEDULER_WINDOW_SECS", DEFAULT_WINDOW_SECS)),
            guard: Duration::from_secs(env_u64("SCHEDULER_GUARD_SECS", DEFAULT_GUARD_SECS)),
            dispatch_timeout: Duration::from_secs(env_u64(
                "DISPATCH_TIMEOUT_SECS",
                DEFAULT_DISPATCH_TIMEOUT_SECS,
            )),
            workers: env_u64("SCHEDULER_WORKERS", DEFAULT_WORKERS as u64) as usize,
        }
    }

    fn window_chrono(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.window.as_millis() as i64)
    }

    fn guard_chrono(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.guard.as_millis() as i64)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(DEFAULT_TICK_SECS),
            window: Duration::from_secs(DEFAULT_WINDOW_SECS),
            guard: Duration::from_secs(DEFAULT_GUARD_SECS),
            dispatch_timeout: Duration::from_secs(DEFAULT_DISPATCH_TIMEOUT_SECS),
            workers: DEFAULT_WORKERS,
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ---------------------------------------------------------------------------
// TickSummary
// ---------------------------------------------------------------------------

/// Counters for one scheduler pass, logged after each tick.
#[derive(Debug, Default, Clone, Copy)]
pub struct TickSummary {
    /// Pending reminders loaded inside the horizon.
    pub candidates: usize,
    /// Interval marks committed by this tick.
    pub fired: usize,
    /// External notifications accepted by the dispatcher.
    pub dispatched: usize,
    /// Intervals delivered as in-app signals only (owner on screen).
    pub suppressed: usize,
    /// Reminders transitioned to resolved.
    pub resolved: usize,
    /// Store or dispatch failures (logged, never fatal).
    pub errors: usize,
}

impl TickSummary {
    fn merge(&mut self, other: TickSummary) {
        self.candidates += other.candidates;
        self.fired += other.fired;
        self.dispatched += other.dispatched;
        self.suppressed += other.suppressed;
        self.resolved += other.resolved;
        self.errors += other.errors;
    }
}

// ---------------------------------------------------------------------------
// ReminderScheduler
// ---------------------------------------------------------------------------

/// Background service that turns elapsed lead times into at-most-one
/// notification attempt per (lead, due time, interval).
pub struct ReminderScheduler {
    config: SchedulerConfig,
    store: Arc<dyn ReminderStore>,
    timelines: Arc<dyn TimelineStore>,
    presence: Arc<PresenceRegistry>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    signals: Arc<SignalBus>,
}

impl ReminderScheduler {
    pub fn new(
        config: SchedulerConfig,
        store: Arc<dyn ReminderStore>,
        timelines: Arc<dyn TimelineStore>,
        presence: Arc<PresenceRegistry>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        signals: Arc<SignalBus>,
    ) -> Self {
        Self {
            config,
            store,
            timelines,
            presence,
            dispatcher,
            signals,
        }
    }

    /// Run the scheduler loop.
    ///
    /// Ticks on a fixed interval until the provided [`CancellationToken`]
    /// is cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            tick_secs = self.config.tick.as_secs(),
            window_secs = self.config.window.as_secs(),
            workers = self.config.workers,
            channel = self.dispatcher.channel(),
            "Reminder scheduler started"
        );

        let mut interval = tokio::time::interval(self.config.tick);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Reminder scheduler cancelled");
                    break;
                }
                _ = interval.tick() => {
                    let summary = self.tick().await;
                    if summary.fired > 0 || summary.resolved > 0 || summary.errors > 0 {
                        tracing::info!(
                            candidates = summary.candidates,
                            fired = summary.fired,
                            dispatched = summary.dispatched,
                            suppressed = summary.suppressed,
                            resolved = summary.resolved,
                            errors = summary.errors,
                            "Reminder tick processed"
                        );
                    } else {
                        tracing::debug!(candidates = summary.candidates, "Reminder tick idle");
                    }
                }
            }
        }
    }

    /// Run one pass at the current time.
    pub async fn tick(&self) -> TickSummary {
        self.tick_at(Utc::now()).await
    }

    /// Run one pass as of `now`.
    ///
    /// Public so tests can replay ticks deterministically; production only
    /// ever calls it through [`tick`](Self::tick).
    pub async fn tick_at(&self, now: Timestamp) -> TickSummary {
        let mut summary = TickSummary::default();

        let timelines = match self.timelines.list_all().await {
            Ok(timelines) => timelines,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load reminder timelines; skipping tick");
                summary.errors += 1;
                return summary;
            }
        };

        let timeline_map: HashMap<DbId, ReminderTimeline> = timelines
            .into_iter()
            .map(|timeline| (timeline.tenant_id, timeline))
            .collect();

        // The horizon must cover the longest lead time that could fire,
        // including tenants that have no stored row and therefore run on
        // the system default.
        let default_max = ReminderTimeline::default_for(0).max_hours().unwrap_or(24.0);
        let max_hours = timeline_map
            .values()
            .filter_map(ReminderTimeline::max_hours)
            .fold(default_max, f64::max);
        let horizon = chrono::Duration::milliseconds((max_hours * 3_600_000.0).round() as i64)
            + self.config.guard_chrono();

        let candidates = match self.store.load_due_candidates(now + horizon).await {
            Ok(candidates) => candidates,
            Err(e) => {
                // Store down: degrade to a no-op tick. Nothing fires
                // without a successful commit, so this is safe.
                tracing::error!(error = %e, "Failed to load due reminders; skipping tick");
                summary.errors += 1;
                return summary;
            }
        };
        summary.candidates = candidates.len();

        // Hash records into a fixed partition per lead so concurrent
        // workers never process the same reminder.
        let workers = self.config.workers.max(1);
        let mut partitions: Vec<Vec<LeadReminder>> = vec![Vec::new(); workers];
        for reminder in candidates {
            let slot = reminder.lead_id.rem_euclid(workers as i64) as usize;
            partitions[slot].push(reminder);
        }

        let timeline_map = &timeline_map;
        let partial_summaries =
            futures::future::join_all(partitions.into_iter().map(|batch| async move {
                let mut partial = TickSummary::default();
                for reminder in batch {
                    self.process_record(now, reminder, timeline_map, &mut partial)
                        .await;
                }
                partial
            }))
            .await;

        for partial in partial_summaries {
            summary.merge(partial);
        }
        summary
    }

    /// Evaluate a single reminder: commit newly due intervals, deliver,
    /// and resolve when nothing can ever fire again.
    async fn process_record(
        &self,
        now: Timestamp,
        reminder: LeadReminder,
        timeline_map: &HashMap<DbId, ReminderTimeline>,
        summary: &mut TickSummary,
    ) {
        let timeline = timeline_map
            .get(&reminder.tenant_id)
            .cloned()
            .unwrap_or_else(|| ReminderTimeline::default_for(reminder.tenant_id));

        // Disabled tenant: no interval evaluation, no firings. The record
        // keeps its due time for a later re-enable; once the due time has
        // passed there is nothing left to wait for.
        if !timeline.enabled {
            if now > reminder.due_at {
                self.resolve(&reminder, summary).await;
            }
            return;
        }

        let window = self.config.window_chrono();
        let dues = due_intervals(
            now,
            reminder.due_at,
            &timeline.intervals,
            &reminder.fired_intervals,
            window,
        );

        let mut fired = reminder.fired_intervals.clone();
        for interval in dues {
            let key = interval.key();
            match self
                .store
                .commit_fired_interval(reminder.lead_id, reminder.due_at, &key)
                .await
            {
                Ok(true) => {
                    summary.fired += 1;
                    fired.push(key);
                    self.deliver(now, &reminder, &timeline, interval, summary).await;
                }
                Ok(false) => {
                    // Another pass already marked it, or the reminder was
                    // rescheduled since this tick loaded it. Not ours to
                    // deliver.
                    tracing::debug!(
                        lead_id = reminder.lead_id,
                        interval = %key,
                        "Fired-interval commit was a no-op, skipping delivery"
                    );
                    fired.push(key);
                }
                Err(e) => {
                    // Partial-failure isolation: leave the rest of this
                    // record for the next tick; it is still pending and
                    // un-marked, so nothing is lost.
                    tracing::error!(
                        lead_id = reminder.lead_id,
                        interval = %key,
                        error = %e,
                        "Failed to commit fired interval"
                    );
                    summary.errors += 1;
                    return;
                }
            }
        }

        if is_exhausted(now, reminder.due_at, &timeline.intervals, &fired, window) {
            self.resolve(&reminder, summary).await;
        }
    }

    /// Choose the delivery channel for one freshly committed interval.
    async fn deliver(
        &self,
        now: Timestamp,
        reminder: &LeadReminder,
        timeline: &ReminderTimeline,
        interval: &ReminderInterval,
        summary: &mut TickSummary,
    ) {
        // The agent already has the screen open: a duplicate email would
        // only annoy. Push a lightweight in-app signal instead.
        if self.presence.is_on_page(reminder.owner_user_id).await {
            self.signals.publish(ReminderSignal {
                tenant_id: reminder.tenant_id,
                lead_id: reminder.lead_id,
                owner_user_id: reminder.owner_user_id,
                lead_label: reminder.lead_label.clone(),
                due_at: reminder.due_at,
                interval_key: interval.key(),
                interval_label: interval.label.clone(),
                published_at: now,
            });
            summary.suppressed += 1;
            tracing::debug!(
                lead_id = reminder.lead_id,
                owner_user_id = reminder.owner_user_id,
                interval = %interval.key(),
                "Owner on reminders screen; in-app signal only"
            );
            return;
        }

        let recipient = reminder
            .owner_email
            .clone()
            .or_else(|| timeline.notification_email.clone());
        let Some(recipient) = recipient else {
            tracing::warn!(
                lead_id = reminder.lead_id,
                owner_user_id = reminder.owner_user_id,
                "No recipient on file for reminder notification; nothing sent"
            );
            return;
        };

        let payload = ReminderPayload {
            tenant_id: reminder.tenant_id,
            lead_id: reminder.lead_id,
            lead_label: reminder.lead_label.clone(),
            owner_user_id: reminder.owner_user_id,
            recipient,
            due_at: reminder.due_at,
            interval_label: interval.label.clone(),
            interval_key: interval.key(),
        };

        // The interval is already marked fired; whatever happens below, it
        // will not be attempted again.
        match self
            .dispatcher
            .send(&payload, self.config.dispatch_timeout)
            .await
        {
            Ok(true) => summary.dispatched += 1,
            Ok(false) => {
                tracing::debug!(
                    lead_id = reminder.lead_id,
                    channel = self.dispatcher.channel(),
                    "Dispatcher reported nothing delivered"
                );
            }
            Err(e) => {
                tracing::error!(
                    lead_id = reminder.lead_id,
                    channel = self.dispatcher.channel(),
                    interval = %payload.interval_key,
                    error = %e,
                    "Reminder dispatch failed; interval stays marked"
                );
                summary.errors += 1;
            }
        }
    }

    async fn resolve(&self, reminder: &LeadReminder, summary: &mut TickSummary) {
        match self
            .store
            .mark_resolved(reminder.lead_id, reminder.due_at)
            .await
        {
            Ok(true) => {
                summary.resolved += 1;
                tracing::debug!(lead_id = reminder.lead_id, "Reminder resolved");
            }
            Ok(false) => {
                // Rescheduled or cancelled since load; the next tick sees
                // the fresh state.
            }
            Err(e) => {
                tracing::warn!(
                    lead_id = reminder.lead_id,
                    error = %e,
                    "Failed to resolve reminder; will retry next tick"
                );
                summary.errors += 1;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_values() {
        let config = SchedulerConfig::default();
        assert_eq!(config.tick, Duration::from_secs(60));
        assert_eq!(config.window, Duration::from_secs(300));
        assert_eq!(config.guard, Duration::from_secs(3600));
        assert_eq!(config.dispatch_timeout, Duration::from_secs(10));
        assert_eq!(config.workers, 4);
    }

    #[test]
    fn tick_is_well_below_window() {
        // The delivery policy accepts missing an interval when ticks are
        // slower than the window; the defaults must not be close.
        let config = SchedulerConfig::default();
        assert!(config.tick * 5 <= config.window);
    }

    #[test]
    fn summary_merge_adds_all_counters() {
        let mut a = TickSummary {
            candidates: 1,
            fired: 2,
            dispatched: 3,
            suppressed: 4,
            resolved: 5,
            errors: 6,
        };
        a.merge(TickSummary {
            candidates: 10,
            fired: 10,
            dispatched: 10,
            suppressed: 10,
            resolved: 10,
            errors: 10,
        });
        assert_eq!(a.candidates, 11);
        assert_eq!(a.fired, 12);
        assert_eq!(a.dispatched, 13);
        assert_eq!(a.suppressed, 14);
        assert_eq!(a.resolved, 15);
        assert_eq!(a.errors, 16);
    }
}
