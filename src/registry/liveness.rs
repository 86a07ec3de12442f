//! Transient liveness cache
//!
//! Maps device id to the reference and liveness last seen for it. Lives in
//! process memory only and starts empty, so every device reads as `unknown`
//! until a message about it arrives. Callers must hold the registry lock.

use std::collections::HashMap;

use super::device::{Device, Liveness};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LivenessEntry {
    pub reference: String,
    pub liveness: Liveness,
}

#[derive(Debug, Default)]
pub struct LivenessCache {
    entries: HashMap<String, LivenessEntry>,
}

impl LivenessCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, id: &str, reference: &str, liveness: Liveness) {
        self.entries.insert(
            id.to_string(),
            LivenessEntry {
                reference: reference.to_string(),
                liveness,
            },
        );
    }

    pub fn get(&self, id: &str) -> Option<&LivenessEntry> {
        self.entries.get(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<LivenessEntry> {
        self.entries.remove(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overwrites the persisted liveness of `device` with the cached one.
    pub fn merge(&self, device: &mut Device) {
        device.liveness = self
            .get(&device.id)
            .map(|entry| entry.liveness)
            .unwrap_or_default();
    }
}
