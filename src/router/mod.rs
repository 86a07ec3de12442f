//! The `router` module turns inbound transport messages into registry calls.

pub mod event;
pub mod handler;

pub use event::{DeviceEvent, DeviceEventData};
pub use handler::MessageRouter;

#[cfg(test)]
mod tests;
