//! Frontend-facing WebSocket endpoint for the X-Tunnel (spec.md §4.1
//! "X-Tunnel"): reshapes `XFrame`s between JSON text frames on the
//! WebSocket and the MQTT-side registry in `xtunnel.rs`.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use spotfi_shared::xtunnel::XFrame;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct XTunnelQuery {
    /// Reconnect-stable id scoping the "close prior session for this
    /// device" rule (spec.md §4.1) to one browser tab/terminal, not to
    /// every concurrent session against the router.
    pub terminal_id: Option<String>,
}

pub async fn upgrade(
    State(state): State<AppState>,
    Path(router_id): Path<String>,
    Query(query): Query<XTunnelQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, router_id, query.terminal_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, router_id: String, terminal_id: Option<String>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (to_websocket, mut from_registry) = tokio::sync::mpsc::channel::<XFrame>(64);

    let session_id = state
        .edge
        .xtunnel
        .start_session(&router_id, terminal_id.as_deref(), to_websocket)
        .await;

    let forward_task = tokio::spawn(async move {
        while let Some(frame) = from_registry.recv().await {
            let Ok(json) = serde_json::to_string(&frame) else { continue };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = ws_receiver.next().await {
        match message {
            Message::Text(text) => state.edge.xtunnel.send_input(&session_id, text.as_bytes()).await,
            Message::Binary(bytes) => state.edge.xtunnel.send_input(&session_id, &bytes).await,
            Message::Close(_) => break,
            _ => {}
        }
    }

    forward_task.abort();
    state.edge.xtunnel.stop_session(&session_id).await;
}
