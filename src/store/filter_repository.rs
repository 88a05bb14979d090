use chrono::Utc;
use dashmap::DashMap;
use log::{info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::filter::codec::from_backend_row;
use crate::models::filter::{FilterId, ImportReport, PersistedFilter};
use crate::utils::error::{AppError, AppResult, FilterError};

/// Saved log filters held by the service
pub struct FilterRepository {
    /// Filter storage - using a thread-safe concurrent hashmap
    filters: Arc<DashMap<u64, PersistedFilter>>,

    /// Next filter ID
    next_id: AtomicU64,
}

impl Default for FilterRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterRepository {
    pub fn new() -> Self {
        Self {
            filters: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// A row is accepted only if it names itself and decodes into criteria
    fn validate(row: &PersistedFilter) -> AppResult<()> {
        if row.filter_name.trim().is_empty() {
            return Err(FilterError::EmptyName.into());
        }
        from_backend_row(row)?;
        Ok(())
    }

    /// Filters ordered by id, optionally limited to one owner
    pub fn list(&self, user_id: Option<u64>) -> Vec<PersistedFilter> {
        let mut filters: Vec<(u64, PersistedFilter)> = self
            .filters
            .iter()
            .filter(|entry| user_id.is_none() || entry.value().user_id == user_id)
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        filters.sort_by_key(|(id, _)| *id);
        filters.into_iter().map(|(_, f)| f).collect()
    }

    pub fn get(&self, id: u64) -> AppResult<PersistedFilter> {
        self.filters
            .get(&id)
            .map(|f| f.value().clone())
            .ok_or_else(|| AppError::not_found("filter", id))
    }

    pub fn create(&self, mut row: PersistedFilter) -> AppResult<PersistedFilter> {
        Self::validate(&row)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        row.id = Some(FilterId::Remote(id));
        row.created_at = Some(now);
        row.updated_at = Some(now);
        self.filters.insert(id, row.clone());
        info!("Created filter {} '{}'", id, row.filter_name);
        Ok(row)
    }

    pub fn update(&self, id: u64, mut row: PersistedFilter) -> AppResult<PersistedFilter> {
        Self::validate(&row)?;
        let mut existing = self
            .filters
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("filter", id))?;
        row.id = Some(FilterId::Remote(id));
        row.created_at = existing.created_at;
        row.updated_at = Some(Utc::now());
        *existing = row.clone();
        info!("Updated filter {} '{}'", id, row.filter_name);
        Ok(row)
    }

    pub fn delete(&self, id: u64) -> AppResult<()> {
        match self.filters.remove(&id) {
            Some((_, removed)) => {
                info!("Deleted filter {} '{}'", id, removed.filter_name);
                Ok(())
            }
            None => Err(AppError::not_found("filter", id)),
        }
    }

    /// Create every row that validates; failures are reported, not fatal
    pub fn import(&self, rows: Vec<PersistedFilter>) -> ImportReport {
        let mut report = ImportReport {
            total: rows.len(),
            ..Default::default()
        };
        for (pos, row) in rows.into_iter().enumerate() {
            let name = row.filter_name.clone();
            match self.create(row) {
                Ok(_) => report.success += 1,
                Err(e) => {
                    warn!("Import of row {} ('{}') failed: {}", pos + 1, name, e);
                    report.fail += 1;
                    report.errors.push(format!("row {} ({}): {}", pos + 1, name, e));
                }
            }
        }
        info!(
            "Imported filters: {} total, {} ok, {} failed",
            report.total, report.success, report.fail
        );
        report
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::codec::to_backend_row;
    use crate::models::filter::FilterCriteria;

    fn row(name: &str, user_id: Option<u64>) -> PersistedFilter {
        to_backend_row(&FilterCriteria::default(), name, user_id).unwrap()
    }

    #[test]
    fn test_crud_cycle() {
        let repo = FilterRepository::new();
        let created = repo.create(row("first", Some(1))).unwrap();
        assert_eq!(created.id, Some(FilterId::Remote(1)));

        let updated = repo.update(1, row("renamed", Some(1))).unwrap();
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(repo.get(1).unwrap().filter_name, "renamed");

        repo.delete(1).unwrap();
        assert!(matches!(repo.get(1), Err(AppError::NotFound { .. })));
        assert!(repo.delete(1).is_err());
    }

    #[test]
    fn test_list_by_owner() {
        let repo = FilterRepository::new();
        repo.create(row("a", Some(1))).unwrap();
        repo.create(row("b", Some(2))).unwrap();
        repo.create(row("c", Some(1))).unwrap();
        let names: Vec<String> = repo.list(Some(1)).into_iter().map(|f| f.filter_name).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(repo.list(None).len(), 3);
    }

    #[test]
    fn test_import_reports_failures() {
        let repo = FilterRepository::new();
        let mut broken = row("bad severities", None);
        broken.severities = Some("1,12".to_string());
        let report = repo.import(vec![row("ok", None), broken, row(" ", None)]);
        assert_eq!(report.total, 3);
        assert_eq!(report.success, 1);
        assert_eq!(report.fail, 2);
        assert!(report.errors[0].contains("bad severities"));
        assert_eq!(repo.len(), 1);
    }
}
