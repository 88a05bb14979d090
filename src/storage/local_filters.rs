use chrono::{Duration, Utc};
use log::info;
use std::sync::Arc;

use crate::models::filter::{FilterId, PersistedFilter};
use crate::storage::kv::{KeyValueStore, KeyValueStoreExt, SAVED_FILTERS_KEY};
use crate::utils::error::StorageError;

/// Saved filters kept under the `savedFilters` key when the backend is
/// unreachable
#[derive(Clone)]
pub struct LocalFilterStore {
    store: Arc<dyn KeyValueStore>,
}

impl LocalFilterStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Result<Vec<PersistedFilter>, StorageError> {
        Ok(self
            .store
            .get_json::<Vec<PersistedFilter>>(SAVED_FILTERS_KEY)?
            .unwrap_or_default())
    }

    pub fn get(&self, id: &FilterId) -> Result<Option<PersistedFilter>, StorageError> {
        Ok(self
            .list()?
            .into_iter()
            .find(|f| f.id.as_ref() == Some(id)))
    }

    /// Store a new filter under a fresh `local_<millis>` id
    pub fn insert(&self, mut filter: PersistedFilter) -> Result<PersistedFilter, StorageError> {
        let saved = self
            .store
            .update_json(SAVED_FILTERS_KEY, |filters: &mut Vec<PersistedFilter>| {
                let mut now = Utc::now();
                let mut id = FilterId::new_local(now);
                // two saves within the same millisecond
                while filters.iter().any(|f| f.id.as_ref() == Some(&id)) {
                    now = now + Duration::milliseconds(1);
                    id = FilterId::new_local(now);
                }
                filter.id = Some(id);
                filter.created_at = Some(Utc::now());
                filter.updated_at = filter.created_at;
                filters.push(filter.clone());
                filter.clone()
            })?;
        info!("Saved filter '{}' locally as {:?}", saved.filter_name, saved.id);
        Ok(saved)
    }

    /// Replace a stored filter; returns `None` when the id is unknown
    pub fn update(
        &self,
        id: &FilterId,
        mut filter: PersistedFilter,
    ) -> Result<Option<PersistedFilter>, StorageError> {
        self.store
            .update_json(SAVED_FILTERS_KEY, |filters: &mut Vec<PersistedFilter>| {
                let slot = filters.iter_mut().find(|f| f.id.as_ref() == Some(id))?;
                filter.id = Some(id.clone());
                filter.created_at = slot.created_at;
                filter.updated_at = Some(Utc::now());
                *slot = filter.clone();
                Some(filter.clone())
            })
    }

    pub fn delete(&self, id: &FilterId) -> Result<bool, StorageError> {
        let removed = self
            .store
            .update_json(SAVED_FILTERS_KEY, |filters: &mut Vec<PersistedFilter>| {
                let before = filters.len();
                filters.retain(|f| f.id.as_ref() != Some(id));
                filters.len() != before
            })?;
        if removed {
            info!("Deleted local filter {}", id);
        }
        Ok(removed)
    }
}
