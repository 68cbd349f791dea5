//! WebSocket and HTTP handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::{
    domain::{ConnectionId, SessionId},
    infrastructure::dto::{ClientEvent, ServerEvent},
};

use super::state::AppState;

/// Query parameters for the WebSocket handshake. A client that remembers
/// its session id passes it here; first-time visitors get one assigned.
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub session_id: Option<String>,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
) -> impl IntoResponse {
    // Connection ids are server-assigned and per-connection; session ids
    // survive reconnects when the client remembers them.
    let connection_id = ConnectionId::new(uuid::Uuid::new_v4().to_string());
    let session_id = SessionId::new(
        query
            .session_id
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
    );

    // Create a channel for this client to receive events
    let (tx, rx) = mpsc::unbounded_channel();
    state
        .chat_service
        .connect(connection_id.clone(), session_id.clone(), tx)
        .await;

    tracing::info!(
        "Connection '{}' established (session '{}')",
        connection_id,
        session_id
    );

    ws.on_upgrade(move |socket| handle_socket(socket, state, connection_id, session_id, rx))
}

/// Spawns a task that drains the connection's outbound channel into the
/// WebSocket sink.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    })
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    connection_id: ConnectionId,
    session_id: SessionId,
    rx: mpsc::UnboundedReceiver<String>,
) {
    let (sender, mut receiver) = socket.split();

    let mut send_task = pusher_loop(rx, sender);

    let recv_connection_id = connection_id.clone();
    let recv_state = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::error!("WebSocket error: {}", e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    let event = match serde_json::from_str::<ClientEvent>(&text) {
                        Ok(event) => event,
                        Err(e) => {
                            tracing::warn!(
                                "Dropping unparseable frame from '{}': {}",
                                recv_connection_id,
                                e
                            );
                            continue;
                        }
                    };
                    dispatch(&recv_state, &recv_connection_id, &session_id, event).await;
                }
                Message::Ping(_) => {
                    tracing::debug!("Received ping");
                    // Ping/pong is handled automatically by the WebSocket protocol
                }
                Message::Close(_) => {
                    tracing::info!("Connection '{}' requested close", recv_connection_id);
                    break;
                }
                _ => {}
            }
        }
    });

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    state.chat_service.disconnect(connection_id.clone()).await;
    tracing::info!("Connection '{}' disconnected and cleaned up", connection_id);
}

/// Route one parsed client event to the corresponding service operation.
async fn dispatch(
    state: &Arc<AppState>,
    connection_id: &ConnectionId,
    session_id: &SessionId,
    event: ClientEvent,
) {
    let service = &state.chat_service;
    match event {
        ClientEvent::RegisterOwner => {
            service.register_owner(connection_id.clone()).await;
        }
        ClientEvent::JoinQueue { user_info } => {
            service
                .join_queue(connection_id.clone(), session_id.clone(), user_info)
                .await;
        }
        ClientEvent::SendMessage {
            text,
            target_connection_id,
        } => {
            service
                .send_message(
                    connection_id.clone(),
                    session_id.clone(),
                    text,
                    target_connection_id.map(ConnectionId::new),
                )
                .await;
        }
        ClientEvent::SwitchChat {
            target_connection_id,
        } => {
            service
                .switch_chat(connection_id.clone(), ConnectionId::new(target_connection_id))
                .await;
        }
        ClientEvent::CloseChat {
            target_connection_id,
        } => {
            service
                .close_chat(connection_id.clone(), ConnectionId::new(target_connection_id))
                .await;
        }
        ClientEvent::EndChat => {
            service.end_chat(connection_id.clone()).await;
        }
        ClientEvent::VisitorClose => {
            service.visitor_close(connection_id.clone()).await;
        }
    }
}

/// Debug endpoint: current routing state as the owner would see it.
pub async fn debug_chat_state(State(state): State<Arc<AppState>>) -> Json<ServerEvent> {
    let snapshot = state.chat_service.snapshot().await;
    Json(ServerEvent::from(snapshot))
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}
