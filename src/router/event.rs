use serde::{Deserialize, Serialize};

use crate::registry::{Attribute, DeviceReport, Liveness};
use crate::utils::RegistryError;

/// Payload published on the device data channel.
///
/// ```json
/// {"method":"set","device_id":"123","data":{"name":"t","state":"online","device_type":"sensor","attributes":[]}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEvent {
    pub method: String,
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub data: Option<DeviceEventData>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceEventData {
    pub name: String,
    pub state: String,
    #[serde(rename = "device_type")]
    pub kind: String,
    pub attributes: Vec<Attribute>,
}

impl DeviceEventData {
    /// Builds the registry input for device `id` seen under `reference`.
    pub fn into_report(self, id: String, reference: &str) -> Result<DeviceReport, RegistryError> {
        let liveness: Liveness = self.state.parse()?;
        Ok(DeviceReport {
            id,
            reference: reference.to_string(),
            name: self.name,
            liveness,
            kind: self.kind,
            attributes: self.attributes,
        })
    }
}
