//! Applied-filter state shared between the filter page and the log list.
//!
//! Applying a filter writes the session slot, the persistent slots and the
//! typed [`LogListState`]. Only one apply runs at a time: [`ApplyGuard`]
//! holds an in-flight token that is released when the guard is committed
//! or dropped.

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::filter::codec::to_form;
use crate::filter::naming::identify_filter_name;
use crate::models::filter::{FilterCriteria, PersistedFilter, Severity, TimeRange};
use crate::storage::kv::{
    KeyValueStore, KeyValueStoreExt, APPLIED_FILTER_KEY, APPLIED_FORM_STATE_KEY,
    CURRENT_ACTIVE_FILTER_KEY, PENDING_EDIT_KEY, PERSISTENT_FILTER_KEY,
};
use crate::utils::error::{AppResult, FilterError};

/// Criteria currently applied to the log list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedFilter {
    pub name: String,
    pub criteria: FilterCriteria,
    pub applied_at: DateTime<Utc>,
}

/// View state the log list renders from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogListState {
    pub filter_name: Option<String>,
    pub keyword: Option<String>,
    pub source_ip: Option<String>,
    pub hostname: Option<String>,
    pub device_types: BTreeSet<String>,
    pub severities: BTreeSet<Severity>,
    pub event_ids: Vec<u32>,
    pub time_range: Option<TimeRange>,
    /// Resolved bounds of `time_range` at apply time
    pub window: Option<(NaiveDateTime, NaiveDateTime)>,
    pub page: usize,
}

impl LogListState {
    fn from_applied(applied: &AppliedFilter, now: NaiveDateTime) -> Self {
        let c = &applied.criteria;
        Self {
            filter_name: Some(applied.name.clone()),
            keyword: c.keyword.clone(),
            source_ip: c.source_ip.clone(),
            hostname: c.hostname.clone(),
            device_types: c.device_types.clone(),
            severities: c.severities.clone(),
            event_ids: c.event_ids.clone(),
            time_range: c.time_range.clone(),
            window: c.time_range.as_ref().map(|r| r.bounds(now)),
            page: 1,
        }
    }
}

/// Owner of the applied-filter state
pub struct FilterSession {
    session: Arc<dyn KeyValueStore>,
    persistent: Arc<dyn KeyValueStore>,
    log_list: RwLock<LogListState>,
    in_flight: Mutex<Option<Uuid>>,
}

/// In-flight apply. Released on drop, so a failed apply never leaves the
/// session locked.
pub struct ApplyGuard<'a> {
    owner: &'a FilterSession,
    token: Uuid,
}

impl ApplyGuard<'_> {
    /// Finish the apply with the given criteria. A missing name is derived
    /// from the criteria.
    pub fn commit(self, name: Option<&str>, criteria: FilterCriteria) -> AppResult<AppliedFilter> {
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| identify_filter_name(&criteria));
        let applied = AppliedFilter {
            name,
            criteria,
            applied_at: Utc::now(),
        };
        self.owner.store_applied(&applied)?;
        info!("Applied filter '{}' ({})", applied.name, self.token);
        Ok(applied)
    }
}

impl Drop for ApplyGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.owner.in_flight.lock();
        if *in_flight == Some(self.token) {
            *in_flight = None;
        }
    }
}

impl FilterSession {
    pub fn new(session: Arc<dyn KeyValueStore>, persistent: Arc<dyn KeyValueStore>) -> Self {
        Self {
            session,
            persistent,
            log_list: RwLock::new(LogListState::default()),
            in_flight: Mutex::new(None),
        }
    }

    /// Reserve the session for one apply
    pub fn begin_apply(&self) -> Result<ApplyGuard<'_>, FilterError> {
        let mut in_flight = self.in_flight.lock();
        if let Some(token) = *in_flight {
            warn!("Ignoring apply while {} is still in flight", token);
            return Err(FilterError::ApplyInProgress);
        }
        let token = Uuid::new_v4();
        *in_flight = Some(token);
        debug!("Apply {} started", token);
        Ok(ApplyGuard { owner: self, token })
    }

    pub fn is_applying(&self) -> bool {
        self.in_flight.lock().is_some()
    }

    /// Apply criteria in one step
    pub fn apply(&self, name: Option<&str>, criteria: FilterCriteria) -> AppResult<AppliedFilter> {
        self.begin_apply()?.commit(name, criteria)
    }

    fn store_applied(&self, applied: &AppliedFilter) -> AppResult<()> {
        self.session.set_json(CURRENT_ACTIVE_FILTER_KEY, applied)?;
        self.persistent.set_json(PERSISTENT_FILTER_KEY, applied)?;
        self.persistent.set_json(APPLIED_FILTER_KEY, &applied.criteria)?;
        self.persistent
            .set_json(APPLIED_FORM_STATE_KEY, &to_form(&applied.criteria))?;
        *self.log_list.write() = LogListState::from_applied(applied, Local::now().naive_local());
        Ok(())
    }

    /// Load the applied filter after a page transition or restart: the
    /// session slot wins over the persistent slot.
    pub fn restore(&self) -> AppResult<Option<AppliedFilter>> {
        let applied = match self.session.get_json::<AppliedFilter>(CURRENT_ACTIVE_FILTER_KEY)? {
            Some(applied) => Some(applied),
            None => self.persistent.get_json::<AppliedFilter>(PERSISTENT_FILTER_KEY)?,
        };

        let mut log_list = self.log_list.write();
        *log_list = match &applied {
            Some(applied) => {
                debug!("Restored applied filter '{}'", applied.name);
                LogListState::from_applied(applied, Local::now().naive_local())
            }
            None => LogListState::default(),
        };
        Ok(applied)
    }

    /// Drop the applied filter everywhere
    pub fn clear(&self) -> AppResult<()> {
        self.session.remove(CURRENT_ACTIVE_FILTER_KEY)?;
        for key in [PERSISTENT_FILTER_KEY, APPLIED_FILTER_KEY, APPLIED_FORM_STATE_KEY] {
            self.persistent.remove(key)?;
        }
        *self.log_list.write() = LogListState::default();
        info!("Cleared applied filter");
        Ok(())
    }

    pub fn log_list(&self) -> LogListState {
        self.log_list.read().clone()
    }

    /// Move to another page of the log list
    pub fn set_page(&self, page: usize) {
        self.log_list.write().page = page.max(1);
    }

    /// Remember the saved filter being edited across a page change
    pub fn set_pending_edit(&self, filter: &PersistedFilter) -> AppResult<()> {
        self.session.set_json(PENDING_EDIT_KEY, filter)?;
        Ok(())
    }

    /// Read and clear the pending edit
    pub fn take_pending_edit(&self) -> AppResult<Option<PersistedFilter>> {
        let pending = self.session.get_json::<PersistedFilter>(PENDING_EDIT_KEY)?;
        if pending.is_some() {
            self.session.remove(PENDING_EDIT_KEY)?;
        }
        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::codec::FilterForm;
    use crate::storage::kv::MemoryStore;

    fn session_with(persistent: Arc<dyn KeyValueStore>) -> FilterSession {
        FilterSession::new(Arc::new(MemoryStore::new()), persistent)
    }

    fn criteria() -> FilterCriteria {
        FilterCriteria {
            keyword: Some("network down".to_string()),
            time_range: Some(TimeRange::Today),
            severities: [Severity::Error].into_iter().collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_apply_updates_all_slots() {
        let persistent: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let session = session_with(persistent.clone());
        let applied = session.apply(None, criteria()).unwrap();

        assert_eq!(applied.name, "错误日志过滤器");
        let log_list = session.log_list();
        assert_eq!(log_list.keyword.as_deref(), Some("network down"));
        assert_eq!(log_list.page, 1);
        assert!(log_list.window.is_some());

        let stored: FilterCriteria = persistent.get_json(APPLIED_FILTER_KEY).unwrap().unwrap();
        assert_eq!(stored, criteria());
        let form: FilterForm = persistent.get_json(APPLIED_FORM_STATE_KEY).unwrap().unwrap();
        assert_eq!(form.severities, vec!["3".to_string()]);
        assert!(!session.is_applying());
    }

    #[test]
    fn test_second_apply_rejected_while_in_flight() {
        let session = session_with(Arc::new(MemoryStore::new()));
        let guard = session.begin_apply().unwrap();
        assert!(session.is_applying());
        assert_eq!(
            session.apply(Some("other"), criteria()).unwrap_err().to_string(),
            "Filter error: a filter is already being applied"
        );
        drop(guard);
        assert!(session.apply(Some("other"), criteria()).is_ok());
    }

    #[test]
    fn test_restore_prefers_session_then_persistent() {
        let persistent: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let first = session_with(persistent.clone());
        first.apply(Some("kept"), criteria()).unwrap();

        // fresh session slot, same persistent store: a reload
        let reloaded = session_with(persistent);
        let restored = reloaded.restore().unwrap().unwrap();
        assert_eq!(restored.name, "kept");
        assert_eq!(reloaded.log_list().filter_name.as_deref(), Some("kept"));

        reloaded.apply(Some("session only"), FilterCriteria::default()).unwrap();
        assert_eq!(reloaded.restore().unwrap().unwrap().name, "session only");
    }

    #[test]
    fn test_clear_resets_state() {
        let session = session_with(Arc::new(MemoryStore::new()));
        session.apply(Some("x"), criteria()).unwrap();
        session.set_page(4);
        assert_eq!(session.log_list().page, 4);
        session.clear().unwrap();
        assert_eq!(session.restore().unwrap(), None);
        assert_eq!(session.log_list(), LogListState::default());
    }

    #[test]
    fn test_pending_edit_is_taken_once() {
        let session = session_with(Arc::new(MemoryStore::new()));
        let row = crate::filter::codec::to_backend_row(&criteria(), "edit me", None).unwrap();
        session.set_pending_edit(&row).unwrap();
        assert_eq!(session.take_pending_edit().unwrap(), Some(row));
        assert_eq!(session.take_pending_edit().unwrap(), None);
    }
}
