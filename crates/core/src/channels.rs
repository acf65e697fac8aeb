//! Well-known notification channel name constants.
//!
//! These must match the channel values used by the reminder scheduler, the
//! in-app signal forwarder, and the API handlers when reporting which way a
//! reminder was delivered.

/// In-app signal pushed over WebSocket to an agent who is already looking
/// at the relevant screen.
pub const CHANNEL_IN_APP: &str = "in_app";

/// Email notification delivered via SMTP.
pub const CHANNEL_EMAIL: &str = "email";

/// Push notification delivered through an external gateway webhook.
pub const CHANNEL_WEBHOOK: &str = "webhook";
