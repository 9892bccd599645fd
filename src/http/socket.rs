//! WebSocket side of the session channel.
//!
//! Each connection gets its own `ConversationSession`; it is registered in
//! `AppState` while the socket is open and dropped when the session ends.

use super::state::AppState;
use crate::channel::{duplex, messages, ClientEvent};
use crate::error::ProtocolError;
use crate::session::{ConversationSession, SessionConfig};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// GET /ws
/// Upgrade to a session channel
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: AppState, socket: WebSocket) {
    let config = SessionConfig::from_config(&state.config);
    let session_id = config.session_id.clone();

    let session = match ConversationSession::new(
        config,
        Arc::clone(&state.responder),
        Arc::clone(&state.summary_sink),
    ) {
        Ok(session) => Arc::new(session),
        Err(e) => {
            error!("Failed to create session: {:#}", e);
            return;
        }
    };

    {
        let mut sessions = state.sessions.write().await;
        sessions.insert(session_id.clone(), Arc::clone(&session));
    }

    info!(session_id = %session_id, "Client connected");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (bridge, server_channel) = duplex();
    let (to_server, mut from_server) = bridge.split();

    // Outgoing: server events -> text frames
    let send_task = tokio::spawn(async move {
        while let Some(item) = from_server.recv().await {
            let Ok(event) = item else { continue };
            match messages::encode(&event) {
                Ok(frame) => {
                    if ws_tx.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Failed to encode {}: {}", event.name(), e),
            }
        }
        let _ = ws_tx.send(Message::Close(None)).await;
    });

    // Incoming: text frames -> client events
    let recv_session_id = session_id.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(msg) = ws_rx.next().await {
            let item = match msg {
                Ok(Message::Text(text)) => messages::decode::<ClientEvent>(&text),
                Ok(Message::Binary(_)) => Err(ProtocolError::BinaryFrame),
                Ok(Message::Close(_)) => {
                    debug!(session_id = %recv_session_id, "Client requested close");
                    break;
                }
                // Axum answers WebSocket-level pings itself
                Ok(_) => continue,
                Err(e) => {
                    warn!(session_id = %recv_session_id, "WebSocket error: {}", e);
                    break;
                }
            };
            if to_server.forward(item).is_err() {
                break;
            }
        }
    });

    match session.run(server_channel).await {
        Ok(stats) => info!(
            session_id = %session_id,
            turns = stats.turn_count,
            duration_secs = stats.duration_secs,
            "Session finished"
        ),
        Err(e) => error!(session_id = %session_id, "Session failed: {:#}", e),
    }

    recv_task.abort();
    // Let queued events (session-ended) flush before the socket closes
    if let Err(e) = send_task.await {
        error!("WebSocket writer task panicked: {}", e);
    }

    {
        let mut sessions = state.sessions.write().await;
        sessions.remove(&session_id);
    }

    info!(session_id = %session_id, "Client disconnected");
}
