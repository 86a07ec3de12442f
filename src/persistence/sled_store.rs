//! Device storage backed by `sled`
//!
//! Two trees are used:
//! - `devices`: device id → JSON-encoded `Device`
//! - `device_refs`: `<reference>\0<id>` → empty, an index for reference lookups
//!
//! Writes that touch both trees run inside one multi-tree transaction. The
//! blocking sled calls are moved onto tokio's blocking pool. A write whose
//! `commit_by` has passed by the end of its transaction is aborted.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionResult,
};
use sled::{Db, Transactional, Tree};
use tokio::time::Instant;

use super::store::DeviceStore;
use crate::registry::{Device, DeviceFilter, Liveness, UserData};
use crate::utils::{InternalError, RegistryError};

const DEVICES_TREE: &str = "devices";
const REFS_TREE: &str = "device_refs";
const REF_SEPARATOR: char = '\0';

#[derive(Clone)]
pub struct SledStore {
    db: Db,
    devices: Tree,
    refs: Tree,
}

impl SledStore {
    /// Open or create a sled database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        Self::with_db(sled::open(path)?)
    }

    /// An in-memory database removed on drop.
    pub fn temporary() -> Result<Self, RegistryError> {
        Self::with_db(sled::Config::new().temporary(true).open()?)
    }

    fn with_db(db: Db) -> Result<Self, RegistryError> {
        let devices = db.open_tree(DEVICES_TREE)?;
        let refs = db.open_tree(REFS_TREE)?;
        Ok(Self { db, devices, refs })
    }

    pub fn flush(&self) -> Result<(), RegistryError> {
        self.db.flush()?;
        Ok(())
    }

    fn create_blocking(&self, device: Device, commit_by: Instant) -> Result<(), RegistryError> {
        let value = serde_json::to_vec(&device)?;
        let index = ref_key(&device.reference, &device.id);

        let result: TransactionResult<(), RegistryError> =
            (&self.devices, &self.refs).transaction(|(devices, refs)| {
                if devices.get(device.id.as_bytes())?.is_some() {
                    return abort(RegistryError::InvalidInput(format!(
                        "device '{}' already exists",
                        device.id
                    )));
                }
                devices.insert(device.id.as_bytes(), value.as_slice())?;
                refs.insert(index.as_slice(), Vec::new())?;
                in_time(commit_by)
            });
        result.map_err(tx_error)
    }

    fn read_blocking(&self, id: &str) -> Result<Device, RegistryError> {
        match self.devices.get(id.as_bytes())? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Err(not_found(id)),
        }
    }

    fn read_all_blocking(&self, filter: &DeviceFilter) -> Result<BTreeMap<String, Device>, RegistryError> {
        let mut found = BTreeMap::new();
        let mut keep = |device: Device| {
            if filter.matches(&device) {
                found.insert(device.id.clone(), device);
            }
        };

        if !filter.ids.is_empty() {
            for id in &filter.ids {
                if let Some(bytes) = self.devices.get(id.as_bytes())? {
                    keep(serde_json::from_slice(&bytes)?);
                }
            }
        } else if let Some(reference) = &filter.reference {
            for id in self.ids_for_reference(reference)? {
                if let Some(bytes) = self.devices.get(id.as_bytes())? {
                    keep(serde_json::from_slice(&bytes)?);
                }
            }
        } else {
            for entry in self.devices.iter() {
                let (_, bytes) = entry?;
                keep(serde_json::from_slice(&bytes)?);
            }
        }
        Ok(found)
    }

    fn update_blocking(&self, device: Device, commit_by: Instant) -> Result<(), RegistryError> {
        let result: TransactionResult<(), RegistryError> =
            (&self.devices, &self.refs).transaction(|(devices, refs)| {
                let Some(bytes) = devices.get(device.id.as_bytes())? else {
                    return abort(not_found(&device.id));
                };
                let stored = decode(&bytes)?;

                let mut updated = device.clone();
                updated.user_data = stored.user_data;
                devices.insert(device.id.as_bytes(), encode(&updated)?)?;

                if stored.reference != device.reference {
                    refs.remove(ref_key(&stored.reference, &device.id))?;
                    refs.insert(ref_key(&device.reference, &device.id), Vec::new())?;
                }
                in_time(commit_by)
            });
        result.map_err(tx_error)
    }

    fn update_user_data_blocking(
        &self,
        id: &str,
        user_data: UserData,
        commit_by: Instant,
    ) -> Result<(), RegistryError> {
        let result: TransactionResult<(), RegistryError> = self.devices.transaction(|devices| {
            let Some(bytes) = devices.get(id.as_bytes())? else {
                return abort(not_found(id));
            };
            let mut device = decode(&bytes)?;
            device.user_data = user_data.clone();
            devices.insert(id.as_bytes(), encode(&device)?)?;
            in_time(commit_by)
        });
        result.map_err(tx_error)
    }

    fn update_liveness_blocking(
        &self,
        reference: &str,
        liveness: Liveness,
        timestamp: DateTime<Utc>,
        commit_by: Instant,
    ) -> Result<usize, RegistryError> {
        let ids = self.ids_for_reference(reference)?;
        if ids.is_empty() {
            return Ok(0);
        }

        let result: TransactionResult<usize, RegistryError> = self.devices.transaction(|devices| {
            let mut changed = 0;
            for id in &ids {
                let Some(bytes) = devices.get(id.as_bytes())? else {
                    continue;
                };
                let mut device = decode(&bytes)?;
                device.liveness = liveness;
                device.updated = Some(timestamp);
                devices.insert(id.as_bytes(), encode(&device)?)?;
                changed += 1;
            }
            in_time(commit_by)?;
            Ok(changed)
        });
        result.map_err(tx_error)
    }

    fn delete_blocking(&self, id: &str, commit_by: Instant) -> Result<(), RegistryError> {
        let result: TransactionResult<(), RegistryError> =
            (&self.devices, &self.refs).transaction(|(devices, refs)| {
                let Some(bytes) = devices.remove(id.as_bytes())? else {
                    return abort(not_found(id));
                };
                let device = decode(&bytes)?;
                refs.remove(ref_key(&device.reference, id))?;
                in_time(commit_by)
            });
        result.map_err(tx_error)
    }

    fn ids_for_reference(&self, reference: &str) -> Result<Vec<String>, RegistryError> {
        let prefix = format!("{reference}{REF_SEPARATOR}");
        let mut ids = Vec::new();
        for entry in self.refs.scan_prefix(prefix.as_bytes()) {
            let (key, _) = entry?;
            if let Ok(id) = std::str::from_utf8(&key[prefix.len()..]) {
                ids.push(id.to_string());
            }
        }
        Ok(ids)
    }
}

#[async_trait]
impl DeviceStore for SledStore {
    async fn create(&self, device: Device, commit_by: Instant) -> Result<(), RegistryError> {
        let store = self.clone();
        blocking(move || store.create_blocking(device, commit_by)).await
    }

    async fn read(&self, id: &str) -> Result<Device, RegistryError> {
        let store = self.clone();
        let id = id.to_string();
        blocking(move || store.read_blocking(&id)).await
    }

    async fn read_all(&self, filter: &DeviceFilter) -> Result<BTreeMap<String, Device>, RegistryError> {
        let store = self.clone();
        let filter = filter.clone();
        blocking(move || store.read_all_blocking(&filter)).await
    }

    async fn update(&self, device: Device, commit_by: Instant) -> Result<(), RegistryError> {
        let store = self.clone();
        blocking(move || store.update_blocking(device, commit_by)).await
    }

    async fn update_user_data(
        &self,
        id: &str,
        user_data: UserData,
        commit_by: Instant,
    ) -> Result<(), RegistryError> {
        let store = self.clone();
        let id = id.to_string();
        blocking(move || store.update_user_data_blocking(&id, user_data, commit_by)).await
    }

    async fn update_liveness(
        &self,
        reference: &str,
        liveness: Liveness,
        timestamp: DateTime<Utc>,
        commit_by: Instant,
    ) -> Result<usize, RegistryError> {
        let store = self.clone();
        let reference = reference.to_string();
        blocking(move || store.update_liveness_blocking(&reference, liveness, timestamp, commit_by))
            .await
    }

    async fn delete(&self, id: &str, commit_by: Instant) -> Result<(), RegistryError> {
        let store = self.clone();
        let id = id.to_string();
        blocking(move || store.delete_blocking(&id, commit_by)).await
    }
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("db", &"sled::Db")
            .field("devices", &self.devices.len())
            .finish()
    }
}

async fn blocking<T, F>(f: F) -> Result<T, RegistryError>
where
    F: FnOnce() -> Result<T, RegistryError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| InternalError::Task(err.to_string()))?
}

fn ref_key(reference: &str, id: &str) -> Vec<u8> {
    format!("{reference}{REF_SEPARATOR}{id}").into_bytes()
}

fn not_found(id: &str) -> RegistryError {
    RegistryError::NotFound(format!("device '{id}'"))
}

fn abort<T>(err: RegistryError) -> ConflictableTransactionResult<T, RegistryError> {
    Err(ConflictableTransactionError::Abort(err))
}

/// Aborts the surrounding transaction once `commit_by` has passed.
fn in_time(commit_by: Instant) -> ConflictableTransactionResult<(), RegistryError> {
    if Instant::now() > commit_by {
        return abort(InternalError::Timeout.into());
    }
    Ok(())
}

fn decode(bytes: &[u8]) -> ConflictableTransactionResult<Device, RegistryError> {
    serde_json::from_slice(bytes).map_err(|err| ConflictableTransactionError::Abort(err.into()))
}

fn encode(device: &Device) -> ConflictableTransactionResult<Vec<u8>, RegistryError> {
    serde_json::to_vec(device).map_err(|err| ConflictableTransactionError::Abort(err.into()))
}

fn tx_error(err: TransactionError<RegistryError>) -> RegistryError {
    match err {
        TransactionError::Abort(err) => err,
        TransactionError::Storage(err) => err.into(),
    }
}
