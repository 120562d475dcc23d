use std::collections::HashMap;

use analyzer_core::types::{Timestamp, UserId};
use axum::body::Bytes;
use axum::extract::ws::{close_code, CloseFrame, Message, Utf8Bytes};
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// The one live connection bound to a user on an endpoint.
pub struct LiveSession {
    /// Distinguishes this connection from a later one of the same user.
    pub conn_id: String,
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    /// When this connection was bound.
    pub connected_at: Timestamp,
}

/// Maps each user to at most one live session.
///
/// Binding a new session for a user closes the previous one, so sends
/// never reach a superseded connection. Thread-safe via interior `RwLock`;
/// designed to be wrapped in `Arc` and shared across the application.
pub struct SessionRegistry {
    /// Endpoint name used in logs.
    name: &'static str,
    sessions: RwLock<HashMap<UserId, LiveSession>>,
}

impl SessionRegistry {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Register `conn_id` as the user's session, closing any prior one with
    /// a normal closure.
    ///
    /// Returns both halves of the session's message channel: the sender
    /// lets the caller reply on this connection only, the receiver feeds the
    /// WebSocket sink.
    pub async fn bind(
        &self,
        user_id: UserId,
        conn_id: String,
    ) -> (WsSender, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = LiveSession {
            conn_id: conn_id.clone(),
            sender: tx.clone(),
            connected_at: chrono::Utc::now(),
        };

        let previous = self.sessions.write().await.insert(user_id.clone(), session);
        if let Some(previous) = previous {
            let _ = previous.sender.send(Message::Close(Some(CloseFrame {
                code: close_code::NORMAL,
                reason: Utf8Bytes::from_static("Replaced by a newer session"),
            })));
            tracing::info!(
                endpoint = self.name,
                user_id = %user_id,
                old_conn_id = %previous.conn_id,
                new_conn_id = %conn_id,
                "Live session taken over",
            );
        }

        (tx, rx)
    }

    /// Remove the user's session, but only if it is still `conn_id`.
    ///
    /// Returns `true` if a session was removed.
    pub async fn unbind(&self, user_id: &UserId, conn_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get(user_id) {
            Some(current) if current.conn_id == conn_id => {
                sessions.remove(user_id);
                true
            }
            _ => false,
        }
    }

    /// Connection currently bound to a user.
    pub async fn current(&self, user_id: &UserId) -> Option<String> {
        self.sessions
            .read()
            .await
            .get(user_id)
            .map(|s| s.conn_id.clone())
    }

    /// Send a message to the user's session.
    ///
    /// Returns `false` when the user has no session or it is closing.
    pub async fn send_to_user(&self, user_id: &UserId, message: Message) -> bool {
        match self.sessions.read().await.get(user_id) {
            Some(session) => session.sender.send(message).is_ok(),
            None => false,
        }
    }

    /// Serialize `payload` and send it as a text frame.
    pub async fn send_json<T: Serialize>(&self, user_id: &UserId, payload: &T) -> bool {
        match serde_json::to_string(payload) {
            Ok(text) => self.send_to_user(user_id, Message::Text(text.into())).await,
            Err(e) => {
                tracing::error!(endpoint = self.name, user_id = %user_id, error = %e, "Failed to encode frame");
                false
            }
        }
    }

    /// Return the current number of bound sessions.
    pub async fn connection_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Send a Close frame to every session, then clear the map.
    ///
    /// Used during graceful shutdown.
    pub async fn shutdown_all(&self) {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        for session in sessions.values() {
            let _ = session.sender.send(Message::Close(None));
        }
        sessions.clear();
        tracing::info!(endpoint = self.name, count, "Closed all live sessions");
    }

    /// Send a Ping frame to every session.
    ///
    /// Used by the heartbeat task to keep connections alive and detect
    /// stale ones.
    pub async fn ping_all(&self) {
        let sessions = self.sessions.read().await;
        for session in sessions.values() {
            let _ = session.sender.send(Message::Ping(Bytes::new()));
        }
    }
}
