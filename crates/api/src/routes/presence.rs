//! Route definitions for presence lookups.

use axum::routing::post;
use axum::Router;

use crate::handlers::presence;
use crate::state::AppState;

/// Routes mounted at `/presence`.
///
/// ```text
/// POST   /filter -> filter_not_on_page
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/filter", post(presence::filter_not_on_page))
}
