//! # devicehub
//!
//! `devicehub` keeps a registry of networked devices whose presence and
//! attributes are announced over MQTT, and serves that registry over HTTP.
//!
//! ## Core Modules
//!
//! - `topic`: wildcard topic matching and the topic names the service uses.
//! - `relay`: a bounded queue between the transport callback and processing.
//! - `router`: turns inbound messages into registry calls.
//! - `registry`: the device model and the concurrency-safe registry engine.
//! - `persistence`: the storage collaborator and its `sled` implementation.
//! - `transport`: the pub/sub client interface and its MQTT implementation.
//! - `api`: the HTTP surface.
//! - `config`: layered configuration loading.
//! - `utils`: error types and logging setup.

pub mod api;
pub mod config;
pub mod persistence;
pub mod registry;
pub mod relay;
pub mod router;
pub mod topic;
pub mod transport;
pub mod utils;
