//! Saved filters as the console sees them: the backend when it answers, the
//! local store when it does not. `local_` ids never go to the backend.

use log::{info, warn};

use crate::client::api_client::FilterApiClient;
use crate::filter::codec::to_backend_row;
use crate::filter::naming::identify_filter_name;
use crate::models::filter::{FilterCriteria, FilterId, ImportReport, PersistedFilter};
use crate::storage::LocalFilterStore;
use crate::utils::error::ClientError;

pub struct SavedFilters {
    client: FilterApiClient,
    local: LocalFilterStore,
    user_id: Option<u64>,
}

impl SavedFilters {
    pub fn new(client: FilterApiClient, local: LocalFilterStore, user_id: Option<u64>) -> Self {
        Self { client, local, user_id }
    }

    /// Backend filters followed by local-only ones. When the backend is
    /// unreachable only the local ones are returned.
    pub async fn list(&self) -> Result<Vec<PersistedFilter>, ClientError> {
        let mut filters = match self.client.list(self.user_id).await {
            Ok(remote) => remote,
            Err(e) if e.is_unreachable() => {
                warn!("Filter API unreachable, listing local filters only: {}", e);
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        filters.extend(self.local.list()?);
        Ok(filters)
    }

    pub async fn get(&self, id: &FilterId) -> Result<PersistedFilter, ClientError> {
        match id {
            FilterId::Local(_) => self
                .local
                .get(id)?
                .ok_or_else(|| ClientError::NotFound(id.to_string())),
            FilterId::Remote(remote_id) => self.client.get(*remote_id).await,
        }
    }

    /// Save criteria under `name`, or a derived name when none is given.
    /// Falls back to the local store when the backend is unreachable.
    pub async fn save(
        &self,
        criteria: &FilterCriteria,
        name: Option<&str>,
    ) -> Result<PersistedFilter, ClientError> {
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| identify_filter_name(criteria));
        let row = to_backend_row(criteria, &name, self.user_id)?;

        match self.client.create(&row).await {
            Ok(saved) => {
                info!("Saved filter '{}' to the backend", saved.filter_name);
                Ok(saved)
            }
            Err(e) if e.is_unreachable() => {
                warn!("Filter API unreachable, saving '{}' locally: {}", name, e);
                Ok(self.local.insert(row)?)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn update(
        &self,
        id: &FilterId,
        criteria: &FilterCriteria,
        name: &str,
    ) -> Result<PersistedFilter, ClientError> {
        let row = to_backend_row(criteria, name, self.user_id)?;
        match id {
            FilterId::Local(_) => self
                .local
                .update(id, row)?
                .ok_or_else(|| ClientError::NotFound(id.to_string())),
            FilterId::Remote(remote_id) => self.client.update(*remote_id, &row).await,
        }
    }

    pub async fn delete(&self, id: &FilterId) -> Result<(), ClientError> {
        match id {
            FilterId::Local(_) => {
                if self.local.delete(id)? {
                    Ok(())
                } else {
                    Err(ClientError::NotFound(id.to_string()))
                }
            }
            FilterId::Remote(remote_id) => self.client.delete(*remote_id).await,
        }
    }

    /// Bulk import. When the backend is unreachable every row is kept
    /// locally and the report counts the local saves.
    pub async fn import(&self, rows: Vec<PersistedFilter>) -> Result<ImportReport, ClientError> {
        match self.client.import(&rows).await {
            Ok(report) => {
                info!(
                    "Imported {} of {} filters on the backend",
                    report.success, report.total
                );
                Ok(report)
            }
            Err(e) if e.is_unreachable() => {
                warn!("Filter API unreachable, importing {} filters locally: {}", rows.len(), e);
                let mut report = ImportReport {
                    total: rows.len(),
                    ..Default::default()
                };
                for mut row in rows {
                    row.id = None;
                    if row.user_id.is_none() {
                        row.user_id = self.user_id;
                    }
                    self.local.insert(row)?;
                    report.success += 1;
                }
                Ok(report)
            }
            Err(e) => Err(e),
        }
    }

    /// Push local-only filters to the backend; the ones that made it are
    /// removed locally. Returns how many were pushed.
    pub async fn sync_local(&self) -> Result<usize, ClientError> {
        let mut pushed = 0;
        for filter in self.local.list()? {
            let Some(local_id) = filter.id.clone() else { continue };
            let mut row = filter;
            row.id = None;
            match self.client.create(&row).await {
                Ok(saved) => {
                    self.local.delete(&local_id)?;
                    info!("Synced local filter {} as {:?}", local_id, saved.id);
                    pushed += 1;
                }
                Err(e) if e.is_unreachable() => return Err(e),
                Err(e) => warn!("Backend refused local filter {}: {}", local_id, e),
            }
        }
        Ok(pushed)
    }
}
