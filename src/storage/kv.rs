//! Key/value stores standing in for the browser's `localStorage` and
//! `sessionStorage`. Values are JSON documents addressed by the same key
//! names the console pages use.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, error, info};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::utils::error::StorageError;

/// Saved filters that only exist locally
pub const SAVED_FILTERS_KEY: &str = "savedFilters";
/// Last applied criteria, as read by the log list
pub const APPLIED_FILTER_KEY: &str = "appliedFilter";
/// Applied criteria that survive a reload
pub const PERSISTENT_FILTER_KEY: &str = "syslogPersistentFilter";
/// Form replay of the applied criteria
pub const APPLIED_FORM_STATE_KEY: &str = "appliedFilterFormState";
/// Session slot: filter active in the current session
pub const CURRENT_ACTIVE_FILTER_KEY: &str = "currentActiveFilter";
/// Session slot: saved filter opened for editing
pub const PENDING_EDIT_KEY: &str = "pendingEdit";

/// Read-modify-write step: receives the current value and returns the one
/// to store, `None` removing the key
pub type RawUpdate<'a> = dyn FnMut(Option<String>) -> Result<Option<String>, StorageError> + 'a;

/// String-keyed JSON storage
pub trait KeyValueStore: Send + Sync {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_raw(&self, key: &str, value: String) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Run `update` on the key with no other write to the store in between
    fn update_raw(&self, key: &str, update: &mut RawUpdate<'_>) -> Result<(), StorageError>;
}

/// Typed access on top of [`KeyValueStore`]
pub trait KeyValueStoreExt: KeyValueStore {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.get_raw(key)? {
            None => Ok(None),
            Some(raw) => decode(key, &raw).map(Some),
        }
    }

    fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        self.set_raw(key, encode(key, value)?)
    }

    /// Atomically edit the value under `key`, starting from `T::default()`
    /// when it is missing
    fn update_json<T, R, F>(&self, key: &str, mut edit: F) -> Result<R, StorageError>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnMut(&mut T) -> R,
    {
        let mut result = None;
        self.update_raw(key, &mut |current| {
            let mut value = match current {
                Some(raw) => decode::<T>(key, &raw)?,
                None => T::default(),
            };
            result = Some(edit(&mut value));
            encode(key, &value).map(Some)
        })?;
        result.ok_or_else(|| StorageError::Encode(key.to_string()))
    }
}

fn encode<T: Serialize + ?Sized>(key: &str, value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|_| StorageError::Encode(key.to_string()))
}

fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T, StorageError> {
    serde_json::from_str(raw).map_err(|source| StorageError::Decode {
        key: key.to_string(),
        source,
    })
}

impl<S: KeyValueStore + ?Sized> KeyValueStoreExt for S {}

/// Process-lifetime store, the `sessionStorage` analogue
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn set_raw(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }

    fn update_raw(&self, key: &str, update: &mut RawUpdate<'_>) -> Result<(), StorageError> {
        // the entry holds the shard lock until it is dropped
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => match update(Some(occupied.get().clone()))? {
                Some(value) => {
                    occupied.insert(value);
                }
                None => {
                    occupied.remove();
                }
            },
            Entry::Vacant(vacant) => {
                if let Some(value) = update(None)? {
                    vacant.insert(value);
                }
            }
        }
        Ok(())
    }
}

/// Store persisted to a single JSON file, the `localStorage` analogue.
///
/// Every read goes to the file and every write reloads it under the store
/// lock before replacing it atomically, so stores opened on the same file
/// see each other's writes. Two processes writing in the same instant can
/// still race; there is no cross-process lock.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let store = Self {
            path,
            write_lock: Mutex::new(()),
        };
        let entries = store.load()?;
        info!("Opened local store at {} ({} keys)", store.path.display(), entries.len());
        Ok(store)
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StorageError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        decode(&self.path.display().to_string(), &raw)
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        let raw = serde_json::to_vec_pretty(entries)
            .map_err(|_| StorageError::Encode(self.path.display().to_string()))?;
        tmp.write_all(&raw)?;
        tmp.persist(&self.path).map_err(|e| {
            error!("Failed to persist local store {}: {}", self.path.display(), e);
            StorageError::Io(e.error)
        })?;
        debug!("Flushed {} keys to {}", entries.len(), self.path.display());
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.load()?.remove(key))
    }

    fn set_raw(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.update_raw(key, &mut |_| Ok(Some(value.clone())))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.update_raw(key, &mut |_| Ok(None))
    }

    fn update_raw(&self, key: &str, update: &mut RawUpdate<'_>) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock();
        let mut entries = self.load()?;
        let current = entries.remove(key);
        let changed = match update(current.clone())? {
            Some(value) => {
                let changed = current.as_ref() != Some(&value);
                entries.insert(key.to_string(), value);
                changed
            }
            None => current.is_some(),
        };
        if changed {
            self.flush(&entries)?;
        }
        Ok(())
    }
}
