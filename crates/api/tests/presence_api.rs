//! Integration tests for the presence endpoints and the gateway-identity
//! extractor.
//!
//! These go through the full Axum router. The database pool is built
//! lazily and never connected: the routes under test only touch the
//! in-memory presence registry.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use leadline_api::config::ServerConfig;
use leadline_api::routes;
use leadline_api::state::AppState;
use leadline_api::ws::WsManager;
use leadline_core::presence::PresenceRegistry;
use leadline_notify::{LogDispatcher, SignalBus};
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        presence_stale_secs: 3600,
        presence_sweep_interval_secs: 600,
    }
}

/// Build the application router over a lazily-connected pool.
///
/// Mirrors the router construction in `main.rs` minus the middleware
/// layers that need a running server environment.
fn build_test_app() -> (Router, Arc<PresenceRegistry>) {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .connect_lazy("postgres://localhost/leadline_test")
        .expect("lazy pool construction should not fail");

    let presence = Arc::new(PresenceRegistry::default());

    let state = AppState {
        pool,
        config: Arc::new(test_config()),
        ws_manager: Arc::new(WsManager::new()),
        presence: Arc::clone(&presence),
        signals: Arc::new(SignalBus::default()),
        dispatcher: Arc::new(LogDispatcher),
    };

    let app = Router::new()
        .nest("/api/v1", routes::api_routes())
        .with_state(state);

    (app, presence)
}

fn filter_request(with_identity: bool, user_ids: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/v1/presence/filter")
        .header("content-type", "application/json");
    if with_identity {
        builder = builder.header("x-tenant-id", "1").header("x-user-id", "7");
    }
    builder
        .body(Body::from(format!(r#"{{"user_ids":{user_ids}}}"#)))
        .unwrap()
}

// ---------------------------------------------------------------------------
// Test: missing gateway identity headers are rejected with 401
// ---------------------------------------------------------------------------

#[tokio::test]
async fn presence_filter_requires_identity_headers() {
    let (app, _presence) = build_test_app();

    let response = app.oneshot(filter_request(false, "[1]")).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Test: a non-numeric identity header is rejected with 401
// ---------------------------------------------------------------------------

#[tokio::test]
async fn presence_filter_rejects_malformed_identity() {
    let (app, _presence) = build_test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/presence/filter")
        .header("content-type", "application/json")
        .header("x-tenant-id", "not-a-number")
        .header("x-user-id", "7")
        .body(Body::from(r#"{"user_ids":[1]}"#))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Test: the filter splits agents by live presence state
// ---------------------------------------------------------------------------

#[tokio::test]
async fn presence_filter_returns_offline_subset() {
    let (app, presence) = build_test_app();

    presence.mark_on_page(1, "conn-a").await;
    presence.mark_on_page(2, "conn-b").await;
    presence.mark_off_page(2).await;
    // User 3 never connected.

    let response = app
        .oneshot(filter_request(true, "[1, 2, 3]"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["data"]["not_on_page"], serde_json::json!([2, 3]));
}
