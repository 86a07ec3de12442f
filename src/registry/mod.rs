//! The `registry` module owns the device records.
//!
//! It provides:
//! - the device model (`Device`, `DeviceReport`, `Liveness`, `UserData`)
//! - input validation shared by transport events and HTTP requests
//! - `DeviceRegistry`, the concurrency-safe engine in front of a `DeviceStore`
//! - `Deadline`, the caller-supplied bound on lock waits and storage calls

pub mod deadline;
pub mod device;
pub mod engine;
pub mod liveness;
pub mod validate;

pub use deadline::Deadline;
pub use device::{Attribute, Device, DeviceFilter, DeviceReport, Liveness, UserData};
pub use engine::{DeviceRegistry, LivenessStorage};
pub use liveness::{LivenessCache, LivenessEntry};
pub use validate::{validate_attributes, validate_report};
