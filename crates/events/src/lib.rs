//! Topic-addressed message bus used to talk to out-of-process producers.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`topic`]: MQTT-style topic filters (`+`, `#`) and the topic names
//!   the visualization bridge reads and writes.
//! - [`BusClient`]: connect/subscribe/publish lifecycle seam, with
//!   [`LocalBusClient`] implementing it on top of [`EventBus`].
//! - [`mqtt`]: [`MqttBusClient`], the same lifecycle against an MQTT
//!   broker (QoS 1, optional persistent session).
//! - [`reconnect`]: exponential backoff for (re)establishing a client
//!   connection.

pub mod bus;
pub mod client;
pub mod mqtt;
pub mod reconnect;
pub mod topic;

pub use bus::{BusMessage, EventBus};
pub use client::{BusClient, BusError, ConnectOptions, LocalBusClient, Subscription};
pub use mqtt::{BrokerAddress, MqttBusClient};
