//! The `transport` module connects the service to the pub/sub broker.
//!
//! It defines the message type handed to the relay, the `PubSubClient`
//! collaborator interface, an MQTT implementation on `rumqttc`, and
//! `DeviceSubscriber`, which (re)establishes device subscriptions every time
//! the client connects.

pub mod message;
pub mod mqtt;
pub mod subscriber;

use std::sync::Arc;

use async_trait::async_trait;

pub use message::InboundMessage;
pub use mqtt::{MqttClient, MqttDriver, qos_from_level};
pub use subscriber::DeviceSubscriber;

use crate::utils::TransportError;

/// Invoked for every delivered message. Runs on the transport's own task
/// and must return without blocking.
pub type MessageCallback = Arc<dyn Fn(InboundMessage) + Send + Sync>;

#[async_trait]
pub trait PubSubClient: Send + Sync {
    /// Subscribes to `pattern`; matching messages are handed to `callback`.
    async fn subscribe(
        &self,
        pattern: &str,
        qos: u8,
        callback: MessageCallback,
    ) -> Result<(), TransportError>;

    async fn publish(
        &self,
        topic: &str,
        qos: u8,
        retained: bool,
        payload: Vec<u8>,
    ) -> Result<(), TransportError>;
}
