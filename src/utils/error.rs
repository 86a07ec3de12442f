//! The `error` module defines the error types used across `devicehub`.
//!
//! Registry failures are grouped into four kinds that callers can match on:
//!
//! - `InvalidInput`: the caller supplied malformed or illegal data. Detected
//!   before any mutation and never retried.
//! - `NotFound`: the referenced device does not exist.
//! - `ResourceBusy`: the registry lock could not be acquired before the
//!   caller's deadline.
//! - `Internal`: persistence or task failures, including timeouts.
//!
//! The relay, router and transport each have their own small error enum.

use thiserror::Error;

/// Errors surfaced by the device registry and its persistence collaborator.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("resource busy: {0}")]
    ResourceBusy(String),

    #[error("internal error: {0}")]
    Internal(#[from] InternalError),
}

/// Causes behind a `RegistryError::Internal`.
#[derive(Debug, Error)]
pub enum InternalError {
    /// A persistence round trip did not finish before its deadline.
    #[error("persistence deadline exceeded")]
    Timeout,

    #[error("storage: {0}")]
    Storage(#[from] sled::Error),

    #[error("encoding: {0}")]
    Encoding(#[from] serde_json::Error),

    /// A blocking storage task panicked or was cancelled.
    #[error("storage task: {0}")]
    Task(String),
}

impl From<sled::Error> for RegistryError {
    fn from(err: sled::Error) -> Self {
        RegistryError::Internal(InternalError::Storage(err))
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Internal(InternalError::Encoding(err))
    }
}

/// Errors returned by `MessageRelay::put`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelayError {
    /// The queue is at capacity; the message was dropped.
    #[error("buffer full")]
    BufferFull,

    /// The relay has been stopped.
    #[error("relay closed")]
    Closed,
}

/// Reasons a single inbound message was dropped by the router.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("parsing topic '{0}' failed")]
    UnmatchedTopic(String),

    #[error("decode device message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("missing device data")]
    MissingData,

    #[error("unknown method '{0}'")]
    UnknownMethod(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Errors from the pub/sub transport client.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid QoS level {0}, must be 0, 1 or 2")]
    InvalidQos(u8),

    #[error("client: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("operation timed out")]
    Timeout,
}
