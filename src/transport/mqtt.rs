//! MQTT client on `rumqttc`
//!
//! `MqttClient::new` returns two halves:
//! - `MqttClient`: cheap to clone, implements `PubSubClient`
//! - `MqttDriver`: owns the rumqttc event loop and must be run on its own task
//!
//! The driver hands every incoming publish to each callback whose pattern
//! matches the topic, reports every accepted connection on a channel, and on
//! connection errors waits `reconnect_delay` before polling again (rumqttc
//! reconnects on the next poll).

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use super::{InboundMessage, MessageCallback, PubSubClient};
use crate::config::settings::MqttSettings;
use crate::topic::is_match;
use crate::utils::TransportError;

pub fn qos_from_level(level: u8) -> Result<QoS, TransportError> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(TransportError::InvalidQos(other)),
    }
}

struct Route {
    pattern: String,
    callback: MessageCallback,
}

/// Subscriptions known to this client, shared with the driver.
#[derive(Clone, Default)]
struct Routes(Arc<RwLock<Vec<Route>>>);

impl Routes {
    fn insert(&self, pattern: &str, callback: MessageCallback) {
        let mut routes = self.0.write().unwrap_or_else(PoisonError::into_inner);
        routes.retain(|route| route.pattern != pattern);
        routes.push(Route {
            pattern: pattern.to_string(),
            callback,
        });
    }

    fn dispatch(&self, topic: &str, payload: &[u8]) -> usize {
        let routes = self.0.read().unwrap_or_else(PoisonError::into_inner);
        let mut delivered = 0;
        for route in routes.iter().filter(|route| is_match(&route.pattern, topic)) {
            (route.callback)(InboundMessage::new(topic, payload.to_vec()));
            delivered += 1;
        }
        delivered
    }
}

#[derive(Clone)]
pub struct MqttClient {
    client: AsyncClient,
    routes: Routes,
    wait_timeout: Duration,
}

pub struct MqttDriver {
    event_loop: EventLoop,
    routes: Routes,
    reconnect_delay: Duration,
}

impl MqttClient {
    /// Builds the client and its driver. No connection is made until the
    /// driver is polled.
    pub fn new(settings: &MqttSettings) -> (Self, MqttDriver) {
        let client_id = settings.client_id();
        let mut options = MqttOptions::new(client_id.clone(), settings.host.clone(), settings.port);
        options.set_keep_alive(Duration::from_secs(settings.keep_alive_secs));
        debug!(%client_id, host = %settings.host, port = settings.port, "mqtt client created");

        let (client, event_loop) = AsyncClient::new(options, settings.channel_capacity.max(1));
        let routes = Routes::default();
        (
            Self {
                client,
                routes: routes.clone(),
                wait_timeout: Duration::from_millis(settings.wait_timeout_ms),
            },
            MqttDriver {
                event_loop,
                routes,
                reconnect_delay: Duration::from_secs(settings.reconnect_delay_secs),
            },
        )
    }

    pub async fn disconnect(&self) -> Result<(), TransportError> {
        self.wait(self.client.disconnect()).await
    }

    async fn wait<F>(&self, request: F) -> Result<(), TransportError>
    where
        F: Future<Output = Result<(), rumqttc::ClientError>>,
    {
        tokio::time::timeout(self.wait_timeout, request)
            .await
            .map_err(|_| TransportError::Timeout)??;
        Ok(())
    }
}

#[async_trait]
impl PubSubClient for MqttClient {
    async fn subscribe(
        &self,
        pattern: &str,
        qos: u8,
        callback: MessageCallback,
    ) -> Result<(), TransportError> {
        let qos = qos_from_level(qos)?;
        self.routes.insert(pattern, callback);
        self.wait(self.client.subscribe(pattern, qos)).await
    }

    async fn publish(
        &self,
        topic: &str,
        qos: u8,
        retained: bool,
        payload: Vec<u8>,
    ) -> Result<(), TransportError> {
        let qos = qos_from_level(qos)?;
        self.wait(self.client.publish(topic, qos, retained, payload))
            .await
    }
}

impl std::fmt::Debug for MqttClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttClient")
            .field("wait_timeout", &self.wait_timeout)
            .finish()
    }
}

impl MqttDriver {
    /// Polls the event loop until `shutdown` resolves.
    ///
    /// Sends `()` on `connected` for every accepted connection, including
    /// reconnects, so the owner can subscribe again.
    pub async fn run(mut self, connected: mpsc::Sender<()>, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        info!("mqtt event loop started");
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                event = self.event_loop.poll() => match event {
                    Ok(event) => {
                        if self.handle_event(event) {
                            // a pending notification already covers this one
                            let _ = connected.try_send(());
                        }
                    }
                    Err(err) => {
                        warn!("mqtt connection lost: {err}, retrying in {:?}", self.reconnect_delay);
                        tokio::select! {
                            _ = &mut shutdown => break,
                            _ = tokio::time::sleep(self.reconnect_delay) => {}
                        }
                    }
                },
            }
        }
        info!("mqtt event loop stopped");
    }

    /// Returns `true` when the event is an accepted connection.
    pub(crate) fn handle_event(&self, event: Event) -> bool {
        match event {
            Event::Incoming(Packet::ConnAck(ack)) => {
                if ack.code == ConnectReturnCode::Success {
                    info!("mqtt connected");
                    true
                } else {
                    warn!(code = ?ack.code, "mqtt connection refused");
                    false
                }
            }
            Event::Incoming(Packet::Publish(publish)) => {
                let delivered = self.routes.dispatch(&publish.topic, &publish.payload);
                trace!(topic = %publish.topic, delivered, "mqtt publish received");
                false
            }
            Event::Incoming(Packet::Disconnect) => {
                warn!("mqtt disconnected by broker");
                false
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for MqttDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttDriver")
            .field("reconnect_delay", &self.reconnect_delay)
            .finish()
    }
}
