//! [`BusClient`] backed by an MQTT broker.
//!
//! One [`rumqttc::EventLoop`] per connection is driven on a background task.
//! Incoming publishes are fanned out through a private [`EventBus`], so a
//! [`Subscription`] behaves the same whether it came from this client or
//! from [`LocalBusClient`](crate::client::LocalBusClient).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bus::{BusMessage, EventBus};
use crate::client::{BusClient, BusError, ConnectOptions, Subscription};
use crate::topic;

/// Port used when a broker URL does not name one.
pub const DEFAULT_BROKER_PORT: u16 = 1883;

/// Outstanding requests queued between the client handle and its event loop.
const REQUEST_CAPACITY: usize = 64;

/// Pause between polls after the broker connection drops.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Host and port of an MQTT broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
}

impl BrokerAddress {
    /// Parse `mqtt://host:port`, `tcp://host:port` or a bare `host[:port]`.
    pub fn parse(url: &str) -> Result<Self, BusError> {
        let rest = url
            .trim()
            .strip_prefix("mqtt://")
            .or_else(|| url.trim().strip_prefix("tcp://"))
            .unwrap_or(url.trim())
            .trim_end_matches('/');

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| BusError::Connection(format!("invalid broker port in '{url}'")))?;
                (host, port)
            }
            None => (rest, DEFAULT_BROKER_PORT),
        };

        if host.is_empty() {
            return Err(BusError::Connection(format!("missing broker host in '{url}'")));
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl std::fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mqtt://{}:{}", self.host, self.port)
    }
}

struct Connection {
    client: AsyncClient,
    driver: JoinHandle<()>,
    stop: CancellationToken,
}

struct MqttState {
    connection: Option<Connection>,
    options: ConnectOptions,
    /// Cancelled when a clean session ends; ends every [`Subscription`].
    session: CancellationToken,
}

/// MQTT client publishing and subscribing with QoS 1.
pub struct MqttBusClient {
    client_id: String,
    broker: BrokerAddress,
    inbound: Arc<EventBus>,
    /// Flipped by the driver task as the broker connection drops and returns.
    online: Arc<AtomicBool>,
    state: RwLock<MqttState>,
}

impl MqttBusClient {
    /// `buffer_capacity` bounds how many received messages a slow
    /// subscription may fall behind before it observes [`BusError::Lagged`].
    pub fn new(client_id: impl Into<String>, broker: BrokerAddress, buffer_capacity: usize) -> Self {
        Self {
            client_id: client_id.into(),
            broker,
            inbound: Arc::new(EventBus::new(buffer_capacity)),
            online: Arc::new(AtomicBool::new(false)),
            state: RwLock::new(MqttState {
                connection: None,
                options: ConnectOptions::default(),
                session: CancellationToken::new(),
            }),
        }
    }

    pub fn broker(&self) -> &BrokerAddress {
        &self.broker
    }

    async fn handle(&self) -> Result<AsyncClient, BusError> {
        let state = self.state.read().await;
        match &state.connection {
            Some(connection) if self.online.load(Ordering::SeqCst) => Ok(connection.client.clone()),
            _ => Err(BusError::NotConnected(self.client_id.clone())),
        }
    }
}

#[async_trait]
impl BusClient for MqttBusClient {
    fn client_id(&self) -> &str {
        &self.client_id
    }

    async fn is_connected(&self) -> bool {
        self.state.read().await.connection.is_some() && self.online.load(Ordering::SeqCst)
    }

    async fn connect(&self, options: ConnectOptions) -> Result<(), BusError> {
        let mut state = self.state.write().await;
        if let Some(previous) = state.connection.take() {
            previous.stop.cancel();
        }

        let mut mqtt = MqttOptions::new(
            self.client_id.clone(),
            self.broker.host.clone(),
            self.broker.port,
        );
        mqtt.set_keep_alive(options.keep_alive);
        mqtt.set_clean_session(options.clean_session);

        let (client, mut eventloop) = AsyncClient::new(mqtt, REQUEST_CAPACITY);
        wait_for_connack(&mut eventloop)
            .await
            .map_err(|e| BusError::Connection(format!("{}: {e}", self.broker)))?;

        if state.session.is_cancelled() {
            state.session = CancellationToken::new();
        }
        self.online.store(true, Ordering::SeqCst);

        let stop = CancellationToken::new();
        let driver = tokio::spawn(drive(
            eventloop,
            Driver {
                client_id: self.client_id.clone(),
                inbound: Arc::clone(&self.inbound),
                online: Arc::clone(&self.online),
                auto_reconnect: options.auto_reconnect,
                session: state.session.clone(),
                stop: stop.clone(),
            },
        ));

        tracing::info!(
            client_id = %self.client_id,
            broker = %self.broker,
            clean_session = options.clean_session,
            "Connected to MQTT broker",
        );
        state.connection = Some(Connection {
            client,
            driver,
            stop,
        });
        state.options = options;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BusError> {
        let mut state = self.state.write().await;
        self.online.store(false, Ordering::SeqCst);

        if let Some(connection) = state.connection.take() {
            if let Err(e) = connection.client.disconnect().await {
                tracing::debug!(client_id = %self.client_id, error = %e, "MQTT disconnect request failed");
            }
            connection.stop.cancel();
            let _ = tokio::time::timeout(RETRY_DELAY, connection.driver).await;
        }
        if state.options.clean_session {
            state.session.cancel();
        }

        tracing::info!(client_id = %self.client_id, broker = %self.broker, "Disconnected from MQTT broker");
        Ok(())
    }

    async fn subscribe(&self, filter: &str) -> Result<Subscription, BusError> {
        if !topic::is_valid_filter(filter) {
            return Err(BusError::InvalidFilter(filter.to_string()));
        }

        let client = self.handle().await?;
        // Receiver first, so nothing the broker sends after SUBACK is missed.
        let receiver = self.inbound.subscribe();
        client
            .subscribe(filter, QoS::AtLeastOnce)
            .await
            .map_err(|e| BusError::Connection(e.to_string()))?;

        let session = self.state.read().await.session.clone();
        Ok(Subscription::new(filter, receiver, session))
    }

    async fn publish(&self, topic: &str, payload: serde_json::Value) -> Result<(), BusError> {
        let client = self.handle().await?;
        let body = serde_json::to_vec(&payload).map_err(|e| BusError::Payload(e.to_string()))?;
        client
            .publish(topic, QoS::AtLeastOnce, false, body)
            .await
            .map_err(|e| BusError::Connection(e.to_string()))
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), ConnectionError> {
    loop {
        if let Event::Incoming(Packet::ConnAck(_)) = eventloop.poll().await? {
            return Ok(());
        }
    }
}

struct Driver {
    client_id: String,
    inbound: Arc<EventBus>,
    online: Arc<AtomicBool>,
    auto_reconnect: bool,
    session: CancellationToken,
    stop: CancellationToken,
}

/// Poll the event loop, forwarding publishes, until stopped.
///
/// Polling again after an error makes `rumqttc` reconnect; with a persistent
/// session the broker then redelivers unacknowledged QoS 1 messages.
async fn drive(mut eventloop: EventLoop, driver: Driver) {
    loop {
        let event = tokio::select! {
            _ = driver.stop.cancelled() => break,
            event = eventloop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let payload = decode_payload(&publish.payload);
                driver.inbound.publish(BusMessage::new(publish.topic, payload));
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                driver.online.store(true, Ordering::SeqCst);
                tracing::info!(client_id = %driver.client_id, "Reconnected to MQTT broker");
            }
            Ok(_) => {}
            Err(e) => {
                driver.online.store(false, Ordering::SeqCst);
                if !driver.auto_reconnect {
                    tracing::warn!(client_id = %driver.client_id, error = %e, "MQTT connection lost");
                    driver.session.cancel();
                    break;
                }
                tracing::warn!(client_id = %driver.client_id, error = %e, "MQTT connection lost, retrying");
                tokio::select! {
                    _ = driver.stop.cancelled() => break,
                    _ = tokio::time::sleep(RETRY_DELAY) => {}
                }
            }
        }
    }
}

/// JSON body of a publish. Empty bodies become `Null`; anything that is
/// not JSON is kept as a string.
fn decode_payload(body: &[u8]) -> serde_json::Value {
    if body.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(body).into_owned()))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_broker_urls() {
        assert_eq!(
            BrokerAddress::parse("mqtt://broker.local:1884").unwrap(),
            BrokerAddress {
                host: "broker.local".into(),
                port: 1884
            }
        );
        assert_eq!(BrokerAddress::parse("tcp://10.0.0.5").unwrap().port, DEFAULT_BROKER_PORT);
        assert_eq!(BrokerAddress::parse("localhost").unwrap().host, "localhost");
    }

    #[test]
    fn rejects_bad_broker_urls() {
        assert_matches!(BrokerAddress::parse("mqtt://:1883"), Err(BusError::Connection(_)));
        assert_matches!(BrokerAddress::parse("mqtt://host:port"), Err(BusError::Connection(_)));
    }

    #[test]
    fn decodes_publish_bodies() {
        assert_eq!(decode_payload(b""), serde_json::Value::Null);
        assert_eq!(decode_payload(br#"{"segment_index":1}"#), json!({ "segment_index": 1 }));
        assert_eq!(decode_payload(b"done"), json!("done"));
    }

    #[tokio::test]
    async fn publish_and_subscribe_require_connection() {
        let client = MqttBusClient::new("test", BrokerAddress::parse("localhost").unwrap(), 16);

        assert!(!client.is_connected().await);
        assert_matches!(
            client.publish("a/b", serde_json::Value::Null).await,
            Err(BusError::NotConnected(_))
        );
        assert_matches!(client.subscribe("a/#").await, Err(BusError::NotConnected(_)));
    }

    #[tokio::test]
    async fn unreachable_broker_fails_to_connect() {
        // Bind then drop a listener so the port is known to be closed.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let broker = BrokerAddress {
            host: "127.0.0.1".into(),
            port,
        };
        let client = MqttBusClient::new("test", broker, 16);

        assert_matches!(
            client.connect(ConnectOptions::default()).await,
            Err(BusError::Connection(_))
        );
        assert!(!client.is_connected().await);
    }
}
