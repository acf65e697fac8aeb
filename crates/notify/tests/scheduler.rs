//! Integration tests for `ReminderScheduler`.
//!
//! The store and dispatcher are in-memory doubles, the presence registry is
//! the real one, and every tick runs at an explicit instant, so the firing
//! state machine can be replayed deterministically: replayed ticks,
//! simulated crashes between the fired-mark and the resolve, dispatch
//! failures, disabled tenants, and fallback recipients.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use leadline_core::presence::PresenceRegistry;
use leadline_core::reminder::{LeadReminder, ReminderStatus};
use leadline_core::timeline::{ReminderInterval, ReminderTimeline};
use leadline_core::types::{DbId, Timestamp};
use leadline_notify::{
    DispatchError, NotificationDispatcher, ReminderPayload, ReminderScheduler, ReminderStore,
    SchedulerConfig, SignalBus, StoreError, TimelineStore,
};

// ---------------------------------------------------------------------------
// In-memory doubles
// ---------------------------------------------------------------------------

/// Reminder store double with the same CAS semantics as the Postgres
/// implementation, plus injectable failures.
struct MemoryStore {
    reminders: Mutex<HashMap<DbId, LeadReminder>>,
    /// Lead ids whose commit calls fail with a store error.
    fail_commits_for: Mutex<Vec<DbId>>,
    /// When set, every mark_resolved call fails (crash-before-resolve).
    fail_resolve: AtomicBool,
}

impl MemoryStore {
    fn new(reminders: Vec<LeadReminder>) -> Self {
        Self {
            reminders: Mutex::new(
                reminders
                    .into_iter()
                    .map(|r| (r.lead_id, r))
                    .collect(),
            ),
            fail_commits_for: Mutex::new(Vec::new()),
            fail_resolve: AtomicBool::new(false),
        }
    }

    fn get(&self, lead_id: DbId) -> LeadReminder {
        self.reminders.lock().unwrap()[&lead_id].clone()
    }
}

#[async_trait]
impl ReminderStore for MemoryStore {
    async fn load_due_candidates(
        &self,
        cutoff: Timestamp,
    ) -> Result<Vec<LeadReminder>, StoreError> {
        let reminders = self.reminders.lock().unwrap();
        let mut due: Vec<LeadReminder> = reminders
            .values()
            .filter(|r| r.status == ReminderStatus::Pending && r.due_at <= cutoff)
            .cloned()
            .collect();
        due.sort_by_key(|r| r.due_at);
        Ok(due)
    }

    async fn commit_fired_interval(
        &self,
        lead_id: DbId,
        due_at: Timestamp,
        interval_key: &str,
    ) -> Result<bool, StoreError> {
        if self.fail_commits_for.lock().unwrap().contains(&lead_id) {
            return Err(StoreError("injected commit failure".into()));
        }
        let mut reminders = self.reminders.lock().unwrap();
        let Some(reminder) = reminders.get_mut(&lead_id) else {
            return Ok(false);
        };
        if reminder.due_at != due_at
            || reminder.status != ReminderStatus::Pending
            || reminder.has_fired(interval_key)
        {
            return Ok(false);
        }
        reminder.fired_intervals.push(interval_key.to_string());
        Ok(true)
    }

    async fn mark_resolved(&self, lead_id: DbId, due_at: Timestamp) -> Result<bool, StoreError> {
        if self.fail_resolve.load(Ordering::SeqCst) {
            return Err(StoreError("injected resolve failure".into()));
        }
        let mut reminders = self.reminders.lock().unwrap();
        let Some(reminder) = reminders.get_mut(&lead_id) else {
            return Ok(false);
        };
        if reminder.due_at != due_at || reminder.status != ReminderStatus::Pending {
            return Ok(false);
        }
        reminder.status = ReminderStatus::Resolved;
        Ok(true)
    }
}

/// Timeline store double returning a fixed list.
struct StaticTimelines(Vec<ReminderTimeline>);

#[async_trait]
impl TimelineStore for StaticTimelines {
    async fn list_all(&self) -> Result<Vec<ReminderTimeline>, StoreError> {
        Ok(self.0.clone())
    }
}

/// Dispatcher double recording every invocation.
struct RecordingDispatcher {
    calls: Mutex<Vec<ReminderPayload>>,
    fail: AtomicBool,
}

impl RecordingDispatcher {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    fn calls(&self) -> Vec<ReminderPayload> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    fn channel(&self) -> &'static str {
        "test"
    }

    async fn send(
        &self,
        payload: &ReminderPayload,
        _timeout: Duration,
    ) -> Result<bool, DispatchError> {
        self.calls.lock().unwrap().push(payload.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(DispatchError::Build("injected dispatch failure".into()));
        }
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    store: Arc<MemoryStore>,
    dispatcher: Arc<RecordingDispatcher>,
    presence: Arc<PresenceRegistry>,
    signals: Arc<SignalBus>,
    scheduler: ReminderScheduler,
}

fn harness(
    config: SchedulerConfig,
    reminders: Vec<LeadReminder>,
    timelines: Vec<ReminderTimeline>,
) -> Harness {
    let store = Arc::new(MemoryStore::new(reminders));
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let presence = Arc::new(PresenceRegistry::default());
    let signals = Arc::new(SignalBus::default());

    let scheduler = ReminderScheduler::new(
        config,
        Arc::clone(&store) as Arc<dyn ReminderStore>,
        Arc::new(StaticTimelines(timelines)) as Arc<dyn TimelineStore>,
        Arc::clone(&presence),
        Arc::clone(&dispatcher) as Arc<dyn NotificationDispatcher>,
        Arc::clone(&signals),
    );

    Harness {
        store,
        dispatcher,
        presence,
        signals,
        scheduler,
    }
}

fn due_time() -> Timestamp {
    Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap()
}

fn pending_reminder(lead_id: DbId, tenant_id: DbId, owner: DbId) -> LeadReminder {
    LeadReminder {
        lead_id,
        tenant_id,
        owner_user_id: owner,
        owner_email: Some("agent@example.com".into()),
        lead_label: "Acme Corp".into(),
        due_at: due_time(),
        fired_intervals: vec![],
        status: ReminderStatus::Pending,
    }
}

fn day_and_hour_timeline(tenant_id: DbId) -> ReminderTimeline {
    ReminderTimeline {
        tenant_id,
        enabled: true,
        intervals: vec![
            ReminderInterval::new(24.0, "1 day before"),
            ReminderInterval::new(1.0, "1 hour before"),
        ],
        notification_email: None,
    }
}

// ---------------------------------------------------------------------------
// Test: the reference scenario, interval by interval, then resolution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn example_scenario_fires_each_interval_once_then_resolves() {
    let t = due_time();
    let h = harness(
        SchedulerConfig::default(),
        vec![pending_reminder(1, 10, 7)],
        vec![day_and_hour_timeline(10)],
    );

    // Two minutes into the 24h firing window.
    let first_tick = t - ChronoDuration::hours(24) + ChronoDuration::minutes(2);
    let summary = h.scheduler.tick_at(first_tick).await;
    assert_eq!(summary.fired, 1);
    assert_eq!(summary.dispatched, 1);
    assert_eq!(h.dispatcher.calls().len(), 1);
    assert_eq!(h.dispatcher.calls()[0].interval_key, "24h");

    // Replay the same tick twice (double-processing): still one dispatch.
    h.scheduler.tick_at(first_tick).await;
    h.scheduler.tick_at(first_tick).await;
    assert_eq!(h.dispatcher.calls().len(), 1);
    assert_eq!(h.store.get(1).fired_intervals, vec!["24h"]);

    // Two minutes into the 1h firing window.
    h.scheduler.tick_at(t - ChronoDuration::hours(1) + ChronoDuration::minutes(2)).await;
    let calls = h.dispatcher.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].interval_key, "1h");

    // Ten minutes past the due time: nothing left, resolve.
    let summary = h.scheduler.tick_at(t + ChronoDuration::minutes(10)).await;
    assert_eq!(summary.resolved, 1);
    assert_eq!(h.dispatcher.calls().len(), 2);
    assert_eq!(h.store.get(1).status, ReminderStatus::Resolved);

    // Resolved records never come back as candidates.
    let summary = h.scheduler.tick_at(t + ChronoDuration::minutes(11)).await;
    assert_eq!(summary.candidates, 0);
}

// ---------------------------------------------------------------------------
// Test: downtime catch-up fires every interval, longest lead time first
// ---------------------------------------------------------------------------

#[tokio::test]
async fn overdue_reminder_fires_all_intervals_in_descending_order() {
    let t = due_time();
    // A window wide enough that both intervals are still open after the
    // due time, as after a long scheduler outage.
    let config = SchedulerConfig {
        window: Duration::from_secs(30 * 3600),
        ..SchedulerConfig::default()
    };
    let h = harness(
        config,
        vec![pending_reminder(1, 10, 7)],
        vec![day_and_hour_timeline(10)],
    );

    let summary = h.scheduler.tick_at(t + ChronoDuration::minutes(10)).await;

    let keys: Vec<String> = h.dispatcher.calls().iter().map(|c| c.interval_key.clone()).collect();
    assert_eq!(keys, vec!["24h", "1h"]);
    assert_eq!(summary.fired, 2);
    assert_eq!(summary.resolved, 1);
    assert_eq!(h.store.get(1).status, ReminderStatus::Resolved);
}

// ---------------------------------------------------------------------------
// Test: owner on the reminders screen suppresses the external send
// ---------------------------------------------------------------------------

#[tokio::test]
async fn presence_suppression_chooses_in_app_signal() {
    let t = due_time();
    let h = harness(
        SchedulerConfig::default(),
        vec![pending_reminder(1, 10, 7)],
        vec![day_and_hour_timeline(10)],
    );

    h.presence.mark_on_page(7, "conn-a").await;
    let mut signal_rx = h.signals.subscribe();

    let summary = h.scheduler.tick_at(t - ChronoDuration::hours(1) + ChronoDuration::minutes(2)).await;

    // No external dispatch, but the interval is marked and signalled.
    assert!(h.dispatcher.calls().is_empty());
    assert_eq!(summary.suppressed, 1);
    assert_eq!(h.store.get(1).fired_intervals, vec!["1h"]);

    let signal = signal_rx.recv().await.expect("in-app signal published");
    assert_eq!(signal.owner_user_id, 7);
    assert_eq!(signal.interval_key, "1h");
    assert_eq!(signal.lead_label, "Acme Corp");
}

// ---------------------------------------------------------------------------
// Test: a stale presence record does not suppress
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stale_presence_falls_back_to_external_send() {
    let t = due_time();
    let h = harness(
        SchedulerConfig::default(),
        vec![pending_reminder(1, 10, 7)],
        vec![day_and_hour_timeline(10)],
    );

    // A registry with a tiny staleness horizon stands in for an agent
    // whose tab went away an hour ago without a disconnect.
    let stale_presence = Arc::new(PresenceRegistry::new(Duration::from_millis(30)));
    stale_presence.mark_on_page(7, "conn-a").await;
    tokio::time::sleep(Duration::from_millis(80)).await;

    let scheduler = ReminderScheduler::new(
        SchedulerConfig::default(),
        Arc::clone(&h.store) as Arc<dyn ReminderStore>,
        Arc::new(StaticTimelines(vec![day_and_hour_timeline(10)])) as Arc<dyn TimelineStore>,
        stale_presence,
        Arc::clone(&h.dispatcher) as Arc<dyn NotificationDispatcher>,
        Arc::clone(&h.signals),
    );

    scheduler.tick_at(t - ChronoDuration::hours(1) + ChronoDuration::minutes(2)).await;

    assert_eq!(h.dispatcher.calls().len(), 1);
}

// ---------------------------------------------------------------------------
// Test: dispatch failure neither unmarks nor retries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dispatch_failure_still_marks_the_interval() {
    let t = due_time();
    let h = harness(
        SchedulerConfig::default(),
        vec![pending_reminder(1, 10, 7)],
        vec![day_and_hour_timeline(10)],
    );
    h.dispatcher.fail.store(true, Ordering::SeqCst);

    let tick = t - ChronoDuration::hours(24) + ChronoDuration::minutes(2);
    let summary = h.scheduler.tick_at(tick).await;

    assert_eq!(summary.fired, 1);
    assert_eq!(summary.dispatched, 0);
    assert_eq!(summary.errors, 1);
    assert_eq!(h.store.get(1).fired_intervals, vec!["24h"]);

    // The failed send is gone for good: the next tick attempts nothing.
    h.scheduler.tick_at(tick).await;
    assert_eq!(h.dispatcher.calls().len(), 1);
}

// ---------------------------------------------------------------------------
// Test: crash between the fired-mark and the resolve is harmless
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_resolve_retries_without_refiring() {
    let t = due_time();
    let mut reminder = pending_reminder(1, 10, 7);
    reminder.fired_intervals = vec!["24h".into(), "1h".into()];

    let h = harness(
        SchedulerConfig::default(),
        vec![reminder],
        vec![day_and_hour_timeline(10)],
    );
    h.store.fail_resolve.store(true, Ordering::SeqCst);

    // Past due, everything fired: only the resolve remains, and it fails.
    let summary = h.scheduler.tick_at(t + ChronoDuration::minutes(10)).await;
    assert_eq!(summary.resolved, 0);
    assert_eq!(summary.errors, 1);
    assert_eq!(h.store.get(1).status, ReminderStatus::Pending);

    // Recovery: the next tick resolves without a single dispatch.
    h.store.fail_resolve.store(false, Ordering::SeqCst);
    let summary = h.scheduler.tick_at(t + ChronoDuration::minutes(11)).await;
    assert_eq!(summary.resolved, 1);
    assert!(h.dispatcher.calls().is_empty());
}

// ---------------------------------------------------------------------------
// Test: disabled tenant fires nothing, resolves only after the due time
// ---------------------------------------------------------------------------

#[tokio::test]
async fn disabled_tenant_never_fires() {
    let t = due_time();
    let mut timeline = day_and_hour_timeline(10);
    timeline.enabled = false;

    let h = harness(
        SchedulerConfig::default(),
        vec![pending_reminder(1, 10, 7)],
        vec![timeline],
    );

    // Inside what would be the 24h window: nothing happens at all.
    let summary = h.scheduler.tick_at(t - ChronoDuration::hours(24) + ChronoDuration::minutes(2)).await;
    assert_eq!(summary.fired, 0);
    assert!(h.dispatcher.calls().is_empty());
    assert!(h.store.get(1).fired_intervals.is_empty());
    assert_eq!(h.store.get(1).status, ReminderStatus::Pending);

    // Once the due time has passed there is nothing left to wait for.
    let summary = h.scheduler.tick_at(t + ChronoDuration::minutes(1)).await;
    assert_eq!(summary.resolved, 1);
    assert!(h.dispatcher.calls().is_empty());
}

// ---------------------------------------------------------------------------
// Test: recipient fallback chain
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_recipient_marks_but_sends_nothing() {
    let t = due_time();
    let mut reminder = pending_reminder(1, 10, 7);
    reminder.owner_email = None;

    let h = harness(
        SchedulerConfig::default(),
        vec![reminder],
        vec![day_and_hour_timeline(10)],
    );

    let summary = h.scheduler.tick_at(t - ChronoDuration::hours(24) + ChronoDuration::minutes(2)).await;

    assert_eq!(summary.fired, 1);
    assert_eq!(summary.dispatched, 0);
    assert!(h.dispatcher.calls().is_empty());
    assert_eq!(h.store.get(1).fired_intervals, vec!["24h"]);
}

#[tokio::test]
async fn tenant_fallback_address_is_used_when_owner_has_none() {
    let t = due_time();
    let mut reminder = pending_reminder(1, 10, 7);
    reminder.owner_email = None;
    let mut timeline = day_and_hour_timeline(10);
    timeline.notification_email = Some("sales@tenant.example".into());

    let h = harness(SchedulerConfig::default(), vec![reminder], vec![timeline]);

    h.scheduler.tick_at(t - ChronoDuration::hours(24) + ChronoDuration::minutes(2)).await;

    let calls = h.dispatcher.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].recipient, "sales@tenant.example");
}

// ---------------------------------------------------------------------------
// Test: one record's store failure does not block the batch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn store_failure_for_one_record_is_isolated() {
    let t = due_time();
    let h = harness(
        SchedulerConfig::default(),
        vec![pending_reminder(1, 10, 7), pending_reminder(2, 10, 8)],
        vec![day_and_hour_timeline(10)],
    );
    h.store.fail_commits_for.lock().unwrap().push(1);

    let summary = h.scheduler.tick_at(t - ChronoDuration::hours(24) + ChronoDuration::minutes(2)).await;

    // Lead 2 fired; lead 1 logged an error and stays fully un-marked, so
    // the next tick inside the window picks it up again.
    assert_eq!(summary.errors, 1);
    assert_eq!(h.dispatcher.calls().len(), 1);
    assert_eq!(h.dispatcher.calls()[0].lead_id, 2);
    assert!(h.store.get(1).fired_intervals.is_empty());

    h.store.fail_commits_for.lock().unwrap().clear();
    h.scheduler.tick_at(t - ChronoDuration::hours(24) + ChronoDuration::minutes(3)).await;
    assert_eq!(h.dispatcher.calls().len(), 2);
}

// ---------------------------------------------------------------------------
// Test: tenants without a stored timeline run on the system default
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_tenant_falls_back_to_default_timeline() {
    let t = due_time();
    let h = harness(
        SchedulerConfig::default(),
        vec![pending_reminder(1, 99, 7)],
        vec![],
    );

    let summary = h.scheduler.tick_at(t - ChronoDuration::hours(24) + ChronoDuration::minutes(2)).await;

    // The default baseline starts with a 24h notice.
    assert_eq!(summary.fired, 1);
    assert_eq!(h.dispatcher.calls()[0].interval_key, "24h");
}

// ---------------------------------------------------------------------------
// Test: a tick outside every window fires nothing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tick_between_windows_is_idle() {
    let t = due_time();
    let h = harness(
        SchedulerConfig::default(),
        vec![pending_reminder(1, 10, 7)],
        vec![day_and_hour_timeline(10)],
    );

    // Twelve hours out: past the 24h window, before the 1h one.
    let summary = h.scheduler.tick_at(t - ChronoDuration::hours(12)).await;

    assert_eq!(summary.candidates, 1);
    assert_eq!(summary.fired, 0);
    assert!(h.dispatcher.calls().is_empty());
}
