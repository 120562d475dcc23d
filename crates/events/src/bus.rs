//! In-process message bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] carries [`BusMessage`]s addressed by a slash-separated
//! topic. It is designed to be shared via `Arc<EventBus>` across the
//! application; clients filter the stream by topic on their side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// BusMessage
// ---------------------------------------------------------------------------

/// One message published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusMessage {
    /// Slash-separated topic, e.g. `"visualization/backend/progress/u1/p1"`.
    pub topic: String,

    /// JSON payload. `Null` when the producer sent an empty body.
    pub payload: serde_json::Value,

    /// When the message was published (UTC).
    pub timestamp: DateTime<Utc>,
}

impl BusMessage {
    pub fn new(topic: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`BusMessage`].
///
/// # Usage
///
/// ```rust
/// use analyzer_events::bus::{BusMessage, EventBus};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(BusMessage::new("global/user/u1/visualization/complete", serde_json::json!({})));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<BusMessage>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a message to all current subscribers.
    ///
    /// If there are no active subscribers the message is silently dropped.
    pub fn publish(&self, message: BusMessage) {
        // Ignore the SendError; it only means there are zero receivers.
        let _ = self.sender.send(message);
    }

    /// Subscribe to every message published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(BusMessage::new(
            "visualization/backend/progress/u1/p1",
            serde_json::json!({"segment_index": 3}),
        ));

        let received = rx.recv().await.expect("should receive the message");
        assert_eq!(received.topic, "visualization/backend/progress/u1/p1");
        assert_eq!(received.payload["segment_index"], 3);
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_message() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(BusMessage::new("a/b", serde_json::Value::Null));

        let m1 = rx1.recv().await.expect("subscriber 1 should receive");
        let m2 = rx2.recv().await.expect("subscriber 2 should receive");

        assert_eq!(m1.topic, "a/b");
        assert_eq!(m2.topic, "a/b");
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(BusMessage::new("orphan", serde_json::Value::Null));
    }
}
