use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::registry::{Device, DeviceFilter, Liveness, UserData};
use crate::utils::RegistryError;

/// Storage collaborator behind `DeviceRegistry`.
///
/// Every method is atomic on its own: a failure leaves no partial write.
/// Implementations do not lock; the registry serialises mutations.
///
/// Mutations carry a `commit_by` instant. A mutation that would commit after
/// it must abort and return `InternalError::Timeout`, leaving storage as it
/// was. The registry waits for mutations to return, so the outcome it reports
/// is always the one stored.
#[async_trait]
pub trait DeviceStore: Send + Sync + 'static {
    /// Inserts a new record. Fails if the id already exists.
    async fn create(&self, device: Device, commit_by: Instant) -> Result<(), RegistryError>;

    async fn read(&self, id: &str) -> Result<Device, RegistryError>;

    /// Every record matching `filter`, keyed by id. Empty filter returns all.
    async fn read_all(&self, filter: &DeviceFilter) -> Result<BTreeMap<String, Device>, RegistryError>;

    /// Replaces the device-reported fields of an existing record. The stored
    /// user annotation is kept.
    async fn update(&self, device: Device, commit_by: Instant) -> Result<(), RegistryError>;

    async fn update_user_data(
        &self,
        id: &str,
        user_data: UserData,
        commit_by: Instant,
    ) -> Result<(), RegistryError>;

    /// Sets liveness and `updated` on every record with `reference`.
    /// Returns how many records changed.
    async fn update_liveness(
        &self,
        reference: &str,
        liveness: Liveness,
        timestamp: DateTime<Utc>,
        commit_by: Instant,
    ) -> Result<usize, RegistryError>;

    async fn delete(&self, id: &str, commit_by: Instant) -> Result<(), RegistryError>;
}
