//! The `topic` module translates transport topic strings into the parts the
//! router cares about.
//!
//! It provides the wildcard matcher and `Topics`, the set of topic names this
//! service subscribes and publishes to.

pub mod matcher;

pub use matcher::{is_match, match_topic};

/// Topic names derived from a common prefix.
///
/// - `devices`: device data channel, one capture (the device reference).
/// - `last_will`: last-will channel, one capture (the device reference).
/// - `refresh`: outbound broadcast asking devices to re-announce themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub devices: String,
    pub last_will: String,
    pub refresh: String,
}

impl Topics {
    pub fn new(prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        Self {
            devices: format!("{prefix}/device/+"),
            last_will: format!("{prefix}/device/+/lw"),
            refresh: format!("{prefix}/refresh"),
        }
    }
}

impl Default for Topics {
    fn default() -> Self {
        Self::new("device-manager")
    }
}

#[cfg(test)]
mod tests;
