//! The `relay` module decouples the transport's delivery callback from
//! message processing.
//!
//! `MessageRelay` is a bounded FIFO with exactly one consumer. Enqueueing
//! never blocks: a full queue rejects the message with `BufferFull`.

pub mod buffer;

pub use buffer::MessageRelay;
