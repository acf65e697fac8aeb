//! Leadline reminder notification infrastructure.
//!
//! This crate owns everything between "a reminder's lead time has passed"
//! and "the agent heard about it":
//!
//! - [`ReminderScheduler`] — the periodic tick that detects newly due
//!   reminder intervals, marks them fired, and routes delivery.
//! - [`store`] — the persistence contracts the scheduler consumes, plus
//!   their Postgres implementations.
//! - [`dispatch`] — the external delivery contract and payload rendering.
//! - [`email`] / [`webhook`] — SMTP and push-gateway dispatchers.
//! - [`SignalBus`] — in-process broadcast of in-app reminder signals,
//!   consumed by the WebSocket layer.

pub mod bus;
pub mod dispatch;
pub mod email;
pub mod scheduler;
pub mod store;
pub mod webhook;

pub use bus::{ReminderSignal, SignalBus};
pub use dispatch::{DispatchError, LogDispatcher, NotificationDispatcher, ReminderPayload};
pub use email::{EmailConfig, EmailDispatcher};
pub use scheduler::{ReminderScheduler, SchedulerConfig, TickSummary};
pub use store::{PgReminderStore, PgTimelineStore, ReminderStore, StoreError, TimelineStore};
pub use webhook::WebhookDispatcher;
