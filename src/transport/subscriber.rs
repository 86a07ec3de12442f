use std::sync::Arc;

use tracing::{info, warn};

use super::{InboundMessage, MessageCallback, PubSubClient};
use crate::relay::MessageRelay;
use crate::topic::Topics;
use crate::utils::TransportError;

const REFRESH_PAYLOAD: &[u8] = b"1";

/// Keeps the device subscriptions alive across (re)connects.
///
/// Both device channels forward straight into the relay. A full relay drops
/// the message with a warning.
#[derive(Debug, Clone)]
pub struct DeviceSubscriber {
    relay: Arc<MessageRelay>,
    topics: Topics,
    qos: u8,
}

impl DeviceSubscriber {
    pub fn new(relay: Arc<MessageRelay>, topics: Topics, qos: u8) -> Self {
        Self { relay, topics, qos }
    }

    /// Subscribes the device data and last-will channels, then asks every
    /// device to announce itself again.
    pub async fn handle_on_connect<C>(&self, client: &C) -> Result<(), TransportError>
    where
        C: PubSubClient + ?Sized,
    {
        for pattern in [&self.topics.devices, &self.topics.last_will] {
            client.subscribe(pattern, self.qos, self.forward()).await?;
            info!(%pattern, qos = self.qos, "subscribed");
        }

        client
            .publish(&self.topics.refresh, self.qos, false, REFRESH_PAYLOAD.to_vec())
            .await?;
        info!(topic = %self.topics.refresh, "requested device refresh");
        Ok(())
    }

    fn forward(&self) -> MessageCallback {
        let relay = Arc::clone(&self.relay);
        Arc::new(move |message: InboundMessage| {
            let topic = message.topic.clone();
            if let Err(err) = relay.put(message) {
                warn!(%topic, "dropping message: {err}");
            }
        })
    }
}
