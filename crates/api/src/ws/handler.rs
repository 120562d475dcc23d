use std::sync::Arc;

use analyzer_core::types::UserId;
use axum::extract::ws::{close_code, CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::state::{AppState, DomainChannel};
use crate::ws::commands::CommandRouter;
use crate::ws::manager::SessionRegistry;

/// Query string of every live-session endpoint.
#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

impl SessionQuery {
    fn user(&self) -> Option<UserId> {
        self.user_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(UserId::from)
    }
}

/// `GET /ws/analysis`: control channel of the evaluation pipeline.
pub async fn analysis_ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<SessionQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let channel = state.evaluation.clone();
    ws.on_upgrade(move |socket| handle_control_socket(socket, query.user(), channel))
}

/// `GET /ws/curation`: control channel of the curation pipeline.
pub async fn curation_ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<SessionQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let channel = state.curation.clone();
    ws.on_upgrade(move |socket| handle_control_socket(socket, query.user(), channel))
}

/// `GET /ws/visualization`: push-only channel fed by the bus relay.
pub async fn visualization_ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<SessionQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let sessions = Arc::clone(&state.visualization_sessions);
    ws.on_upgrade(move |socket| async move {
        match query.user() {
            Some(user_id) => run_session(socket, user_id, sessions, None).await,
            None => reject(socket, sessions.name()).await,
        }
    })
}

async fn handle_control_socket(socket: WebSocket, user_id: Option<UserId>, channel: DomainChannel) {
    match user_id {
        Some(user_id) => {
            run_session(socket, user_id, channel.sessions, Some(channel.commands)).await
        }
        None => reject(socket, channel.sessions.name()).await,
    }
}

/// Close a connection that did not identify its user.
async fn reject(mut socket: WebSocket, endpoint: &'static str) {
    tracing::warn!(endpoint, "WebSocket without userId rejected");
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: close_code::UNSUPPORTED,
            reason: Utf8Bytes::from_static("userId query parameter is required"),
        })))
        .await;
}

/// Manage a single bound WebSocket connection.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Binds the connection as the user's live session.
///   2. Spawns a sender task that forwards messages from the registry channel.
///   3. Dispatches inbound text frames as control commands, if `commands`
///      is set; otherwise they are ignored.
///   4. Unbinds on disconnect, unless a newer session has taken over.
async fn run_session(
    socket: WebSocket,
    user_id: UserId,
    sessions: Arc<SessionRegistry>,
    commands: Option<Arc<CommandRouter>>,
) {
    let endpoint = sessions.name();
    let conn_id = uuid::Uuid::new_v4().to_string();
    let (reply_tx, mut rx) = sessions.bind(user_id.clone(), conn_id.clone()).await;
    tracing::info!(endpoint, user_id = %user_id, conn_id = %conn_id, "WebSocket connected");

    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let Some(router) = &commands else {
                    tracing::trace!(endpoint, conn_id = %conn_id, "Ignoring inbound frame");
                    continue;
                };
                match router.dispatch(&user_id, text.as_str()) {
                    Ok((command, job_id)) => {
                        tracing::info!(endpoint, user_id = %user_id, job_id = %job_id, %command, "Command accepted");
                    }
                    Err(e) => {
                        tracing::warn!(endpoint, user_id = %user_id, error = %e, "Command rejected");
                        let _ = reply_tx.send(Message::Text(e.reply().to_string().into()));
                    }
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    sessions.unbind(&user_id, &conn_id).await;
    send_task.abort();
    tracing::info!(endpoint, user_id = %user_id, conn_id = %conn_id, "WebSocket disconnected");
}
