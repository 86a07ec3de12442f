//! Device model
//!
//! `Device` is the merged view returned to callers: device-reported fields,
//! liveness, timestamps and the user annotation. `DeviceReport` carries the
//! fields a device announces about itself and is the input to `upsert`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::RegistryError;

/// Online/offline status of a device. `Unknown` until a signal is observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Liveness {
    Online,
    Offline,
    #[default]
    Unknown,
}

impl Liveness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Liveness::Online => "online",
            Liveness::Offline => "offline",
            Liveness::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a wire value. The empty string means "not reported".
impl FromStr for Liveness {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(Liveness::Unknown),
            "online" => Ok(Liveness::Online),
            "offline" => Ok(Liveness::Offline),
            other => Err(RegistryError::InvalidInput(format!("invalid state: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// User-editable annotation, timestamped independently of the device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    pub updated: Option<DateTime<Utc>>,
}

/// Fields a device reports about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceReport {
    pub id: String,
    #[serde(rename = "ref")]
    pub reference: String,
    pub name: String,
    #[serde(rename = "state")]
    pub liveness: Liveness,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    #[serde(rename = "ref")]
    pub reference: String,
    pub name: String,
    #[serde(rename = "state")]
    pub liveness: Liveness,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_data: UserData,
}

impl Device {
    /// A freshly created record for `report`.
    pub fn from_report(report: DeviceReport, created: DateTime<Utc>) -> Self {
        Self {
            id: report.id,
            reference: report.reference,
            name: report.name,
            liveness: report.liveness,
            kind: report.kind,
            attributes: report.attributes,
            created: Some(created),
            updated: None,
            user_data: UserData::default(),
        }
    }

    /// Replaces the device-reported fields, keeping `created` and `user_data`.
    pub fn apply_report(&mut self, report: DeviceReport, updated: DateTime<Utc>) {
        self.reference = report.reference;
        self.name = report.name;
        self.liveness = report.liveness;
        self.kind = report.kind;
        self.attributes = report.attributes;
        self.updated = Some(updated);
    }
}

/// Conjunctive filter for `DeviceRegistry::list`. Empty matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceFilter {
    pub ids: Vec<String>,
    pub liveness: Option<Liveness>,
    pub kind: Option<String>,
    pub reference: Option<String>,
}

impl DeviceFilter {
    pub fn matches(&self, device: &Device) -> bool {
        (self.ids.is_empty() || self.ids.iter().any(|id| *id == device.id))
            && self.liveness.is_none_or(|l| l == device.liveness)
            && self.kind.as_ref().is_none_or(|k| *k == device.kind)
            && self
                .reference
                .as_ref()
                .is_none_or(|r| *r == device.reference)
    }
}
