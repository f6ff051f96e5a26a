// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::{CalicoError, ErrorKind};

#[derive(Debug, Default)]
pub(crate) struct MemoryBackend {
    data: Mutex<BTreeMap<String, String>>,
}

impl MemoryBackend {
    fn lock(
        &self,
    ) -> Result<MutexGuard<'_, BTreeMap<String, String>>, CalicoError> {
        self.data.lock().map_err(|e| {
            CalicoError::new(
                ErrorKind::Bug,
                format!("Failed to acquire lock on memory datastore: {e}"),
            )
        })
    }

    pub(crate) fn get(&self, key: &str) -> Result<Option<String>, CalicoError> {
        Ok(self.lock()?.get(key).cloned())
    }

    /// Like etcd v2, a key cannot hold a value and children at the same
    /// time.
    pub(crate) fn set(&self, key: &str, value: &str) -> Result<(), CalicoError> {
        let mut data = self.lock()?;
        let dir = format!("{key}/");
        if data
            .range(dir.clone()..)
            .next()
            .is_some_and(|(k, _)| k.starts_with(&dir))
        {
            return Err(CalicoError::new(
                ErrorKind::InvalidArgument,
                format!("Key {key} is a directory"),
            ));
        }
        if let Some(parent) = key
            .match_indices('/')
            .skip(1)
            .map(|(i, _)| &key[..i])
            .find(|parent| data.contains_key(*parent))
        {
            return Err(CalicoError::new(
                ErrorKind::InvalidArgument,
                format!("Key {parent} is not a directory"),
            ));
        }
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub(crate) fn delete(&self, key: &str) -> Result<(), CalicoError> {
        match self.lock()?.remove(key) {
            Some(_) => Ok(()),
            None => Err(CalicoError::new(
                ErrorKind::NotFound,
                format!("Key {key} not found"),
            )),
        }
    }

    pub(crate) fn list(
        &self,
        prefix: &str,
    ) -> Result<Vec<(String, String)>, CalicoError> {
        let dir = format!("{}/", prefix.trim_end_matches('/'));
        Ok(self
            .lock()?
            .iter()
            .filter(|(k, _)| k.as_str() == prefix || k.starts_with(&dir))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
