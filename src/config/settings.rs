use serde::Deserialize;
use uuid::Uuid;

use crate::registry::LivenessStorage;

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub mqtt: MqttSettings,
    pub relay: RelaySettings,
    pub registry: RegistrySettings,
    pub logger: LoggerSettings,
}

/// HTTP listener. `provisioning` exposes the device-facing write routes.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub provisioning: bool,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DatabaseSettings {
    pub path: String,
    /// Upper bound on every storage round trip.
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: Option<String>,
    pub keep_alive_secs: u64,
    pub qos: u8,
    pub topic_prefix: String,
    pub wait_timeout_ms: u64,
    pub reconnect_delay_secs: u64,
    pub channel_capacity: usize,
}

impl MqttSettings {
    /// The configured client id, or a fresh `device-manager_<uuid>`.
    pub fn client_id(&self) -> String {
        match self.client_id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("device-manager_{}", Uuid::new_v4()),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RelaySettings {
    pub message_buffer: usize,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct RegistrySettings {
    pub liveness: LivenessStorage,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggerSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing sections and values are filled from `Settings::default()`.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub database: Option<PartialDatabaseSettings>,
    pub mqtt: Option<PartialMqttSettings>,
    pub relay: Option<PartialRelaySettings>,
    pub registry: Option<PartialRegistrySettings>,
    pub logger: Option<PartialLoggerSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub provisioning: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialDatabaseSettings {
    pub path: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialMqttSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub client_id: Option<String>,
    pub keep_alive_secs: Option<u64>,
    pub qos: Option<u8>,
    pub topic_prefix: Option<String>,
    pub wait_timeout_ms: Option<u64>,
    pub reconnect_delay_secs: Option<u64>,
    pub channel_capacity: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialRelaySettings {
    pub message_buffer: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialRegistrySettings {
    pub liveness: Option<LivenessStorage>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLoggerSettings {
    pub level: Option<String>,
}

impl PartialSettings {
    /// Fills every missing value from `defaults`.
    pub fn merge(self, defaults: Settings) -> Settings {
        let server = self.server.unwrap_or_default();
        let database = self.database.unwrap_or_default();
        let mqtt = self.mqtt.unwrap_or_default();
        let relay = self.relay.unwrap_or_default();
        let registry = self.registry.unwrap_or_default();
        let logger = self.logger.unwrap_or_default();

        Settings {
            server: ServerSettings {
                host: server.host.unwrap_or(defaults.server.host),
                port: server.port.unwrap_or(defaults.server.port),
                provisioning: server.provisioning.unwrap_or(defaults.server.provisioning),
            },
            database: DatabaseSettings {
                path: database.path.unwrap_or(defaults.database.path),
                timeout_ms: database.timeout_ms.unwrap_or(defaults.database.timeout_ms),
            },
            mqtt: MqttSettings {
                host: mqtt.host.unwrap_or(defaults.mqtt.host),
                port: mqtt.port.unwrap_or(defaults.mqtt.port),
                client_id: mqtt.client_id.or(defaults.mqtt.client_id),
                keep_alive_secs: mqtt.keep_alive_secs.unwrap_or(defaults.mqtt.keep_alive_secs),
                qos: mqtt.qos.unwrap_or(defaults.mqtt.qos),
                topic_prefix: mqtt.topic_prefix.unwrap_or(defaults.mqtt.topic_prefix),
                wait_timeout_ms: mqtt.wait_timeout_ms.unwrap_or(defaults.mqtt.wait_timeout_ms),
                reconnect_delay_secs: mqtt
                    .reconnect_delay_secs
                    .unwrap_or(defaults.mqtt.reconnect_delay_secs),
                channel_capacity: mqtt
                    .channel_capacity
                    .unwrap_or(defaults.mqtt.channel_capacity),
            },
            relay: RelaySettings {
                message_buffer: relay.message_buffer.unwrap_or(defaults.relay.message_buffer),
            },
            registry: RegistrySettings {
                liveness: registry.liveness.unwrap_or(defaults.registry.liveness),
            },
            logger: LoggerSettings {
                level: logger.level.unwrap_or(defaults.logger.level),
            },
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            provisioning: false,
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "devicehub_db".to_string(),
            timeout_ms: 5000,
        }
    }
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: None,
            keep_alive_secs: 30,
            qos: 2,
            topic_prefix: "device-manager".to_string(),
            wait_timeout_ms: 5000,
            reconnect_delay_secs: 5,
            channel_capacity: 100,
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            message_buffer: 50000,
        }
    }
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
