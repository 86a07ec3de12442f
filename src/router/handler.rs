//! Message router
//!
//! Classifies an inbound message by topic, decodes the payload where needed
//! and issues the matching registry call:
//!
//! - `<prefix>/device/<ref>` with `set`: upsert the device under `<ref>`
//! - `<prefix>/device/<ref>` with `delete`: delete the device
//! - `<prefix>/device/<ref>/lw`: mark every device under `<ref>` offline
//!
//! Any failure is returned to the caller (the relay worker), which logs it
//! and moves on. Nothing here is retried.

use std::sync::Arc;

use tracing::{debug, info};

use super::event::DeviceEvent;
use crate::persistence::DeviceStore;
use crate::registry::{Deadline, DeviceRegistry, Liveness};
use crate::topic::{Topics, match_topic};
use crate::transport::InboundMessage;
use crate::utils::RouteError;

pub struct MessageRouter<S> {
    registry: Arc<DeviceRegistry<S>>,
    topics: Topics,
}

impl<S: DeviceStore> MessageRouter<S> {
    pub fn new(registry: Arc<DeviceRegistry<S>>, topics: Topics) -> Self {
        Self { registry, topics }
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    pub async fn handle(&self, message: InboundMessage) -> Result<(), RouteError> {
        let mut captures = [""];
        if match_topic(&self.topics.devices, &message.topic, &mut captures) {
            return self.handle_device(captures[0], &message.payload).await;
        }
        if match_topic(&self.topics.last_will, &message.topic, &mut captures) {
            return self.handle_last_will(captures[0]).await;
        }
        Err(RouteError::UnmatchedTopic(message.topic))
    }

    async fn handle_device(&self, reference: &str, payload: &[u8]) -> Result<(), RouteError> {
        let event: DeviceEvent = serde_json::from_slice(payload)?;
        debug!(reference, method = %event.method, id = %event.device_id, "device message");

        match event.method.as_str() {
            "set" => {
                let data = event.data.ok_or(RouteError::MissingData)?;
                let report = data.into_report(event.device_id, reference)?;
                self.registry.upsert(Deadline::none(), report).await?;
            }
            "delete" => {
                self.registry
                    .delete(Deadline::none(), &event.device_id)
                    .await?;
            }
            other => return Err(RouteError::UnknownMethod(other.to_string())),
        }
        Ok(())
    }

    async fn handle_last_will(&self, reference: &str) -> Result<(), RouteError> {
        let changed = self
            .registry
            .mark_liveness(Deadline::none(), reference, Liveness::Offline)
            .await?;
        info!(reference, changed, "last will received, devices offline");
        Ok(())
    }
}

impl<S> std::fmt::Debug for MessageRouter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRouter")
            .field("topics", &self.topics)
            .finish()
    }
}
