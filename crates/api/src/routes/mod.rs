//! Route tree assembly.

pub mod health;
pub mod notifications;
pub mod presence;
pub mod reminders;
pub mod timeline;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws?user_id={id}                         presence WebSocket
///
/// /reminders/timeline                      get, put (tenant timeline)
/// /reminders/timeline/reset                reset to system default (POST)
///
/// /leads/{lead_id}/reminder                get, set (PUT), cancel (DELETE)
///
/// /notifications/test                      manual dispatcher check (POST)
///
/// /presence/filter                         split agents by on-page state (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/reminders/timeline", timeline::router())
        .nest("/leads", reminders::router())
        .nest("/notifications", notifications::router())
        .nest("/presence", presence::router())
}
