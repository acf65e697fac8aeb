use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use leadline_core::presence::PresenceMessage;
use leadline_core::types::DbId;
use serde::Deserialize;

use crate::state::AppState;

/// Query parameters for the WebSocket upgrade.
///
/// The gateway injects the verified agent id into the upgrade URL; header
/// extraction is not available once the browser opens a raw WebSocket.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub user_id: DbId,
}

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the connection is registered with `WsManager` and its
/// inbound presence messages are applied to the `PresenceRegistry`.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.user_id))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with `WsManager`.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Applies inbound presence messages on the current task.
///   4. Cleans up the connection and the presence record on disconnect.
async fn handle_socket(socket: WebSocket, state: AppState, user_id: DbId) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, user_id, "WebSocket connected");

    // Register and get the receiver for outbound messages.
    let mut rx = state.ws_manager.add(conn_id.clone(), user_id).await;

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward channel messages to the WebSocket sink.
    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    // Receiver loop: apply inbound presence messages.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                // Heartbeat replies count as liveness.
                state.presence.touch(user_id).await;
            }
            Ok(Message::Text(text)) => match serde_json::from_str::<PresenceMessage>(&text) {
                Ok(PresenceMessage::PageEnter) => {
                    state.presence.mark_on_page(user_id, conn_id.clone()).await;
                }
                Ok(PresenceMessage::PageLeave) => {
                    state.presence.mark_off_page(user_id).await;
                }
                Ok(PresenceMessage::Heartbeat) => {
                    state.presence.touch(user_id).await;
                }
                Err(e) => {
                    tracing::debug!(conn_id = %conn_id, error = %e, "Unrecognized WebSocket message");
                }
            },
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Clean up: drop the presence record, deregister, abort sender task.
    state.presence.remove(user_id).await;
    state.ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, user_id, "WebSocket disconnected");
}
