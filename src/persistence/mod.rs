//! The `persistence` module stores device records.
//!
//! `DeviceStore` is the collaborator interface the registry talks to.
//! `SledStore` implements it on `sled`, an embedded key-value store, with
//! multi-tree transactions so each operation is all-or-nothing.

pub mod sled_store;
pub mod store;

pub use sled_store::SledStore;
pub use store::DeviceStore;

#[cfg(test)]
mod tests;
