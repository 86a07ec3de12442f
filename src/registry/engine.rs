//! Device registry
//!
//! `DeviceRegistry` owns every device record and is the only component that
//! mutates them. It is shared between the relay worker (transport events)
//! and HTTP request handlers.
//!
//! Concurrency:
//! - One reader/writer lock guards the registry state. Mutations, including
//!   the liveness fan-out, hold the write half for their whole duration,
//!   persistence round trip included. Reads hold the read half. A reader
//!   therefore never sees a half-applied upsert.
//! - Lock acquisition waits no longer than the caller's `Deadline` and fails
//!   with `ResourceBusy` otherwise.
//! - Each persistence call is bounded by the earlier of the caller's deadline
//!   and the configured timeout, failing with `InternalError::Timeout`. Reads
//!   are abandoned at the bound. Writes hand the bound to the store, which
//!   aborts instead of committing late, and are awaited under the lock until
//!   the store answers.
//!
//! Liveness can live in two places, chosen at construction:
//! - `Transient`: an in-memory cache keyed by id, merged into every read.
//!   Persisted records carry `unknown`. The cache starts empty on restart.
//! - `Persisted`: written to storage with the rest of the record.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::time::Instant;
use tracing::{debug, error};

use super::deadline::Deadline;
use super::device::{Attribute, Device, DeviceFilter, DeviceReport, Liveness, UserData};
use super::liveness::LivenessCache;
use super::validate::{validate_attributes, validate_report};
use crate::persistence::DeviceStore;
use crate::utils::{InternalError, RegistryError};

/// Where device liveness is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LivenessStorage {
    #[default]
    Transient,
    Persisted,
}

pub struct DeviceRegistry<S> {
    store: S,
    pub(crate) state: RwLock<LivenessCache>,
    liveness_storage: LivenessStorage,
    timeout: Duration,
}

impl<S: DeviceStore> DeviceRegistry<S> {
    /// `timeout` caps every persistence round trip.
    pub fn new(store: S, timeout: Duration, liveness_storage: LivenessStorage) -> Self {
        Self {
            store,
            state: RwLock::new(LivenessCache::new()),
            liveness_storage,
            timeout,
        }
    }

    pub fn liveness_storage(&self) -> LivenessStorage {
        self.liveness_storage
    }

    /// Creates the device or replaces its reported fields.
    ///
    /// A new record gets `created = now` and no `updated`. An existing one
    /// keeps `created` and its user annotation and gets `updated = now`.
    pub async fn upsert(&self, deadline: Deadline, report: DeviceReport) -> Result<(), RegistryError> {
        validate_report(&report)?;
        let mut state = self.write(deadline).await?;
        debug!(id = %report.id, reference = %report.reference, "put device");

        let id = report.id.clone();
        let reference = report.reference.clone();
        let liveness = report.liveness;
        let mut report = report;
        if self.liveness_storage == LivenessStorage::Transient {
            report.liveness = Liveness::Unknown;
        }

        let now = Utc::now();
        let stored = match self.io(deadline, self.store.read(&id)).await {
            Ok(mut device) => {
                device.apply_report(report, now);
                self.store.update(device, self.commit_by(deadline)).await
            }
            Err(RegistryError::NotFound(_)) => {
                self.store
                    .create(Device::from_report(report, now), self.commit_by(deadline))
                    .await
            }
            Err(err) => Err(err),
        };
        if let Err(err) = stored {
            log_failure("put device", &id, &err);
            return Err(err);
        }

        if self.liveness_storage == LivenessStorage::Transient {
            state.set(&id, &reference, liveness);
        }
        Ok(())
    }

    pub async fn get(&self, deadline: Deadline, id: &str) -> Result<Device, RegistryError> {
        let state = self.read(deadline).await?;
        debug!(id, "get device");
        let mut device = self
            .io(deadline, self.store.read(id))
            .await
            .inspect_err(|err| log_failure("get device", id, err))?;
        self.merge(&state, &mut device);
        Ok(device)
    }

    /// Devices matching every criterion in `filter`, keyed by id.
    pub async fn list(
        &self,
        deadline: Deadline,
        filter: &DeviceFilter,
    ) -> Result<BTreeMap<String, Device>, RegistryError> {
        let state = self.read(deadline).await?;
        debug!(?filter, "get devices");

        let mut query = filter.clone();
        if self.liveness_storage == LivenessStorage::Transient {
            // storage does not know the current liveness
            query.liveness = None;
        }
        let mut devices = self
            .io(deadline, self.store.read_all(&query))
            .await
            .inspect_err(|err| log_failure("get devices", "*", err))?;

        if self.liveness_storage == LivenessStorage::Transient {
            for device in devices.values_mut() {
                state.merge(device);
            }
            if let Some(liveness) = filter.liveness {
                devices.retain(|_, device| device.liveness == liveness);
            }
        }
        Ok(devices)
    }

    /// Replaces the user annotation. The device's own `updated` is untouched.
    pub async fn set_user_data(
        &self,
        deadline: Deadline,
        id: &str,
        name: String,
        attributes: Vec<Attribute>,
    ) -> Result<(), RegistryError> {
        validate_attributes(&attributes)?;
        let _state = self.write(deadline).await?;
        debug!(id, %name, "set device user data");

        let user_data = UserData {
            name,
            attributes,
            updated: Some(Utc::now()),
        };
        self.store
            .update_user_data(id, user_data, self.commit_by(deadline))
            .await
            .inspect_err(|err| log_failure("set device user data", id, err))
    }

    /// Sets `liveness` on every device whose reference is `reference`.
    ///
    /// Succeeds when nothing matches. Returns the number of devices changed.
    pub async fn mark_liveness(
        &self,
        deadline: Deadline,
        reference: &str,
        liveness: Liveness,
    ) -> Result<usize, RegistryError> {
        let mut state = self.write(deadline).await?;
        debug!(reference, %liveness, "set device states");

        let changed = match self.liveness_storage {
            LivenessStorage::Persisted => {
                self.store
                    .update_liveness(reference, liveness, Utc::now(), self.commit_by(deadline))
                    .await
            }
            LivenessStorage::Transient => {
                let filter = DeviceFilter {
                    reference: Some(reference.to_string()),
                    ..Default::default()
                };
                self.io(deadline, self.store.read_all(&filter))
                    .await
                    .map(|devices| {
                        for id in devices.keys() {
                            state.set(id, reference, liveness);
                        }
                        devices.len()
                    })
            }
        };
        changed.inspect_err(|err| log_failure("set device states", reference, err))
    }

    /// Removes the device and its cached liveness.
    pub async fn delete(&self, deadline: Deadline, id: &str) -> Result<(), RegistryError> {
        let mut state = self.write(deadline).await?;
        debug!(id, "delete device");
        self.store
            .delete(id, self.commit_by(deadline))
            .await
            .inspect_err(|err| log_failure("delete device", id, err))?;
        state.remove(id);
        Ok(())
    }

    fn merge(&self, state: &LivenessCache, device: &mut Device) {
        if self.liveness_storage == LivenessStorage::Transient {
            state.merge(device);
        }
    }

    async fn read(&self, deadline: Deadline) -> Result<RwLockReadGuard<'_, LivenessCache>, RegistryError> {
        if deadline.is_expired() {
            return self.state.try_read().map_err(|_| busy());
        }
        match deadline.instant() {
            None => Ok(self.state.read().await),
            Some(at) => tokio::time::timeout_at(at, self.state.read())
                .await
                .map_err(|_| busy()),
        }
    }

    async fn write(&self, deadline: Deadline) -> Result<RwLockWriteGuard<'_, LivenessCache>, RegistryError> {
        if deadline.is_expired() {
            return self.state.try_write().map_err(|_| busy());
        }
        match deadline.instant() {
            None => Ok(self.state.write().await),
            Some(at) => tokio::time::timeout_at(at, self.state.write())
                .await
                .map_err(|_| busy()),
        }
    }

    fn commit_by(&self, deadline: Deadline) -> Instant {
        deadline.bound(self.timeout)
    }

    async fn io<T>(
        &self,
        deadline: Deadline,
        op: impl Future<Output = Result<T, RegistryError>>,
    ) -> Result<T, RegistryError> {
        tokio::time::timeout_at(deadline.bound(self.timeout), op)
            .await
            .map_err(|_| InternalError::Timeout)?
    }
}

impl<S> std::fmt::Debug for DeviceRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("liveness_storage", &self.liveness_storage)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn busy() -> RegistryError {
    RegistryError::ResourceBusy("registry lock not acquired before deadline".to_string())
}

fn log_failure(op: &str, subject: &str, err: &RegistryError) {
    match err {
        RegistryError::NotFound(_) | RegistryError::InvalidInput(_) => {
            debug!(subject, "{op}: {err}")
        }
        _ => error!(subject, "{op}: {err}"),
    }
}
