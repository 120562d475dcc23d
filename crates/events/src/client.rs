//! Bus client lifecycle: connect, subscribe, publish, disconnect.
//!
//! [`BusClient`] is the seam the visualization relay is written against.
//! [`LocalBusClient`] implements it on top of the in-process
//! [`EventBus`]; [`MqttBusClient`](crate::mqtt::MqttBusClient) implements it
//! against an MQTT broker.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;

use crate::bus::{BusMessage, EventBus};
use crate::topic;

/// Options applied when a client connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Re-establish the connection automatically when it drops.
    pub auto_reconnect: bool,
    /// Discard subscriptions on disconnect. A persistent session
    /// (`false`) keeps them alive across reconnects.
    pub clean_session: bool,
    pub keep_alive: Duration,
}

impl ConnectOptions {
    /// Auto-reconnecting, persistent session.
    pub fn persistent(keep_alive: Duration) -> Self {
        Self {
            auto_reconnect: true,
            clean_session: false,
            keep_alive,
        }
    }
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            auto_reconnect: false,
            clean_session: true,
            keep_alive: Duration::from_secs(60),
        }
    }
}

/// Errors raised by bus clients.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Bus client {0} is not connected")]
    NotConnected(String),

    #[error("Invalid topic filter: {0}")]
    InvalidFilter(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Invalid payload: {0}")]
    Payload(String),

    #[error("Subscription {filter} fell behind and lost {skipped} message(s)")]
    Lagged { filter: String, skipped: u64 },
}

/// A live subscription on one topic filter.
///
/// Yields only messages whose topic matches the filter. Ends when the
/// session it belongs to is discarded or the bus is dropped.
#[derive(Debug)]
pub struct Subscription {
    filter: String,
    receiver: broadcast::Receiver<BusMessage>,
    session: CancellationToken,
}

impl Subscription {
    pub fn new(
        filter: impl Into<String>,
        receiver: broadcast::Receiver<BusMessage>,
        session: CancellationToken,
    ) -> Self {
        Self {
            filter: filter.into(),
            receiver,
            session,
        }
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Wait for the next matching message.
    ///
    /// Yields `Err(BusError::Lagged)` once for every run of messages that
    /// overflowed the buffer before this subscription read them; the
    /// subscription stays usable afterwards. `None` means it has ended.
    pub async fn next(&mut self) -> Option<Result<BusMessage, BusError>> {
        loop {
            let received = tokio::select! {
                _ = self.session.cancelled() => return None,
                received = self.receiver.recv() => received,
            };

            match received {
                Ok(message) if topic::matches(&self.filter, &message.topic) => {
                    return Some(Ok(message))
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    return Some(Err(BusError::Lagged {
                        filter: self.filter.clone(),
                        skipped,
                    }))
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Connection lifecycle of a bus client.
#[async_trait]
pub trait BusClient: Send + Sync {
    fn client_id(&self) -> &str;

    async fn is_connected(&self) -> bool;

    async fn connect(&self, options: ConnectOptions) -> Result<(), BusError>;

    async fn disconnect(&self) -> Result<(), BusError>;

    /// Subscribe to a topic filter. Requires a connection.
    async fn subscribe(&self, filter: &str) -> Result<Subscription, BusError>;

    /// Publish with at-least-once intent. Requires a connection.
    async fn publish(&self, topic: &str, payload: serde_json::Value) -> Result<(), BusError>;
}

struct SessionState {
    connected: bool,
    options: ConnectOptions,
    /// Cancelled when a clean-session client disconnects.
    session: CancellationToken,
}

/// [`BusClient`] over the in-process [`EventBus`].
pub struct LocalBusClient {
    client_id: String,
    bus: Arc<EventBus>,
    state: RwLock<SessionState>,
}

impl LocalBusClient {
    pub fn new(client_id: impl Into<String>, bus: Arc<EventBus>) -> Self {
        Self {
            client_id: client_id.into(),
            bus,
            state: RwLock::new(SessionState {
                connected: false,
                options: ConnectOptions::default(),
                session: CancellationToken::new(),
            }),
        }
    }

    /// Options of the most recent `connect`.
    pub async fn options(&self) -> ConnectOptions {
        self.state.read().await.options.clone()
    }
}

#[async_trait]
impl BusClient for LocalBusClient {
    fn client_id(&self) -> &str {
        &self.client_id
    }

    async fn is_connected(&self) -> bool {
        self.state.read().await.connected
    }

    async fn connect(&self, options: ConnectOptions) -> Result<(), BusError> {
        let mut state = self.state.write().await;
        if state.session.is_cancelled() {
            state.session = CancellationToken::new();
        }
        state.connected = true;
        state.options = options;
        tracing::debug!(client_id = %self.client_id, options = ?state.options, "Bus client connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BusError> {
        let mut state = self.state.write().await;
        state.connected = false;
        if state.options.clean_session {
            state.session.cancel();
        }
        tracing::debug!(client_id = %self.client_id, "Bus client disconnected");
        Ok(())
    }

    async fn subscribe(&self, filter: &str) -> Result<Subscription, BusError> {
        if !topic::is_valid_filter(filter) {
            return Err(BusError::InvalidFilter(filter.to_string()));
        }

        let state = self.state.read().await;
        if !state.connected {
            return Err(BusError::NotConnected(self.client_id.clone()));
        }

        Ok(Subscription::new(
            filter,
            self.bus.subscribe(),
            state.session.clone(),
        ))
    }

    async fn publish(&self, topic: &str, payload: serde_json::Value) -> Result<(), BusError> {
        if !self.state.read().await.connected {
            return Err(BusError::NotConnected(self.client_id.clone()));
        }
        self.bus.publish(BusMessage::new(topic, payload));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn client(bus: &Arc<EventBus>) -> LocalBusClient {
        LocalBusClient::new("test-client", Arc::clone(bus))
    }

    #[tokio::test]
    async fn publish_requires_connection() {
        let bus = Arc::new(EventBus::default());
        let c = client(&bus);

        assert_matches!(
            c.publish("a/b", serde_json::Value::Null).await,
            Err(BusError::NotConnected(_))
        );
    }

    #[tokio::test]
    async fn subscription_filters_by_topic() {
        let bus = Arc::new(EventBus::default());
        let c = client(&bus);
        c.connect(ConnectOptions::default()).await.unwrap();

        let mut sub = c.subscribe("visualization/backend/+/+/+").await.unwrap();
        c.publish("visualization/frontend/progress/u/p", serde_json::json!({}))
            .await
            .unwrap();
        c.publish("visualization/backend/complete/u/p", serde_json::json!({"n": 1}))
            .await
            .unwrap();

        let msg = sub.next().await.expect("matching message").unwrap();
        assert_eq!(msg.topic, "visualization/backend/complete/u/p");
        assert_eq!(msg.payload["n"], 1);
    }

    #[tokio::test]
    async fn invalid_filter_is_rejected() {
        let bus = Arc::new(EventBus::default());
        let c = client(&bus);
        c.connect(ConnectOptions::default()).await.unwrap();

        assert_matches!(c.subscribe("a/#/b").await, Err(BusError::InvalidFilter(_)));
    }

    #[tokio::test]
    async fn persistent_session_survives_reconnect() {
        let bus = Arc::new(EventBus::default());
        let c = client(&bus);
        c.connect(ConnectOptions::persistent(Duration::from_secs(60)))
            .await
            .unwrap();
        let mut sub = c.subscribe("x/#").await.unwrap();

        c.disconnect().await.unwrap();
        // Published by another producer while this client is offline.
        bus.publish(BusMessage::new("x/1", serde_json::Value::Null));
        c.connect(ConnectOptions::persistent(Duration::from_secs(60)))
            .await
            .unwrap();

        let msg = sub
            .next()
            .await
            .expect("queued message survives reconnect")
            .unwrap();
        assert_eq!(msg.topic, "x/1");
    }

    #[tokio::test]
    async fn clean_session_ends_subscriptions_on_disconnect() {
        let bus = Arc::new(EventBus::default());
        let c = client(&bus);
        c.connect(ConnectOptions::default()).await.unwrap();
        let mut sub = c.subscribe("x/#").await.unwrap();

        c.disconnect().await.unwrap();

        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn overflow_is_reported_then_delivery_resumes() {
        let bus = Arc::new(EventBus::new(2));
        let c = client(&bus);
        c.connect(ConnectOptions::default()).await.unwrap();
        let mut sub = c.subscribe("x/#").await.unwrap();

        for i in 0..5 {
            bus.publish(BusMessage::new(format!("x/{i}"), serde_json::Value::Null));
        }

        assert_matches!(
            sub.next().await,
            Some(Err(BusError::Lagged { skipped: 3, .. }))
        );
        let msg = sub.next().await.expect("retained message").unwrap();
        assert_eq!(msg.topic, "x/3");
    }
}
