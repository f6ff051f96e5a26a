// SPDX-License-Identifier: Apache-2.0

use super::etcd::EtcdV2Backend;
use super::memory::MemoryBackend;
use crate::{
    CalicoClientConfig, CalicoDatastoreType, CalicoError, ErrorKind,
};

#[derive(Debug)]
enum DatastoreBackend {
    EtcdV2(EtcdV2Backend),
    Memory(MemoryBackend),
}

/// Handle to the backend store holding network and address allocation state.
///
/// One instance is created per process and shared through `Arc` by both
/// driver handles. Keys are absolute paths like `/calico/v1/...`.
#[derive(Debug)]
pub struct CalicoDatastoreClient {
    config: CalicoClientConfig,
    backend: DatastoreBackend,
}

impl CalicoDatastoreClient {
    /// For etcd, the cluster is probed once so an unreachable backend fails
    /// here instead of on the first plugin request.
    pub async fn new(config: CalicoClientConfig) -> Result<Self, CalicoError> {
        let backend = match config.datastore_type {
            CalicoDatastoreType::EtcdV2 => {
                let backend = EtcdV2Backend::new(&config)?;
                let version = backend.version().await?;
                log::debug!("Connected to etcd {version}");
                DatastoreBackend::EtcdV2(backend)
            }
            CalicoDatastoreType::Memory => {
                DatastoreBackend::Memory(MemoryBackend::default())
            }
        };
        Ok(Self { config, backend })
    }

    pub fn datastore_type(&self) -> CalicoDatastoreType {
        self.config.datastore_type
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, CalicoError> {
        validate_key(key)?;
        match &self.backend {
            DatastoreBackend::EtcdV2(b) => b.get(key).await,
            DatastoreBackend::Memory(b) => b.get(key),
        }
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), CalicoError> {
        validate_key(key)?;
        log::trace!("Setting datastore key {key}");
        match &self.backend {
            DatastoreBackend::EtcdV2(b) => b.set(key, value).await,
            DatastoreBackend::Memory(b) => b.set(key, value),
        }
    }

    /// Return [ErrorKind::NotFound] if `key` does not exist.
    pub async fn delete(&self, key: &str) -> Result<(), CalicoError> {
        validate_key(key)?;
        log::trace!("Deleting datastore key {key}");
        match &self.backend {
            DatastoreBackend::EtcdV2(b) => b.delete(key).await,
            DatastoreBackend::Memory(b) => b.delete(key),
        }
    }

    /// Recursively list all key/value pairs stored under `prefix`, sorted by
    /// key. Listing a missing prefix gives an empty Vec.
    pub async fn list(
        &self,
        prefix: &str,
    ) -> Result<Vec<(String, String)>, CalicoError> {
        validate_key(prefix)?;
        match &self.backend {
            DatastoreBackend::EtcdV2(b) => b.list(prefix).await,
            DatastoreBackend::Memory(b) => b.list(prefix),
        }
    }
}

fn validate_key(key: &str) -> Result<(), CalicoError> {
    if !key.starts_with('/') || key.split('/').any(|s| s == "..") {
        Err(CalicoError::new(
            ErrorKind::InvalidArgument,
            format!(
                "Invalid datastore key {key:?}, should be an absolute path \
                 without '..'"
            ),
        ))
    } else {
        Ok(())
    }
}
