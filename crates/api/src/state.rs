use std::sync::Arc;

use leadline_core::presence::PresenceRegistry;
use leadline_notify::{NotificationDispatcher, SignalBus};

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: leadline_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// WebSocket connection manager (browser clients).
    pub ws_manager: Arc<WsManager>,
    /// Live presence registry consulted by the scheduler and the handlers.
    pub presence: Arc<PresenceRegistry>,
    /// In-app reminder signal bus (scheduler -> WebSocket forwarder).
    pub signals: Arc<SignalBus>,
    /// External notification channel, for the manual test trigger.
    pub dispatcher: Arc<dyn NotificationDispatcher>,
}
