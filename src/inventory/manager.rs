use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use std::collections::BTreeMap;

use crate::models::inventory::{ComponentAction, ComponentKind, ComponentRecord, ComponentStatus};
use crate::utils::error::{AppError, AppResult};

/// In-memory business/component inventory
pub struct InventoryManager {
    components: BTreeMap<u64, ComponentRecord>,
}

impl InventoryManager {
    pub fn new(components: Vec<ComponentRecord>) -> Self {
        Self {
            components: components.into_iter().map(|c| (c.id, c)).collect(),
        }
    }

    /// Inventory seeded with the demo estate shown on the dashboard
    pub fn with_defaults() -> Self {
        Self::new(default_components(Utc::now()))
    }

    /// Components ordered by id, narrowed by environment and status
    pub fn list(
        &self,
        environment: Option<&str>,
        status: Option<ComponentStatus>,
    ) -> Vec<ComponentRecord> {
        self.components
            .values()
            .filter(|c| environment.map_or(true, |env| c.environment.eq_ignore_ascii_case(env)))
            .filter(|c| status.map_or(true, |s| c.status == s))
            .cloned()
            .collect()
    }

    pub fn get(&self, id: u64) -> AppResult<ComponentRecord> {
        self.components
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found("component", id))
    }

    /// Apply a lifecycle action.
    ///
    /// Start needs a stopped component. Stop and restart need one that is not
    /// stopped. Restart resets the start time and clears warning/error.
    pub fn perform(&mut self, id: u64, action: ComponentAction) -> AppResult<ComponentRecord> {
        let component = self
            .components
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("component", id))?;
        let now = Utc::now();

        match (action, component.status) {
            (ComponentAction::Start, ComponentStatus::Stopped) => {
                component.status = ComponentStatus::Running;
                component.started_at = Some(now);
            }
            (ComponentAction::Stop, status) if status != ComponentStatus::Stopped => {
                component.status = ComponentStatus::Stopped;
                component.started_at = None;
                component.cpu_usage = 0.0;
                component.memory_usage = 0.0;
            }
            (ComponentAction::Restart, status) if status != ComponentStatus::Stopped => {
                component.status = ComponentStatus::Running;
                component.started_at = Some(now);
            }
            (action, status) => {
                warn!("Rejected {:?} on component {} in state {}", action, id, status);
                return Err(AppError::TransitionError(format!(
                    "cannot {:?} component {} while {}",
                    action, component.name, status
                )));
            }
        }

        info!("Component {} '{}' is now {}", id, component.name, component.status);
        Ok(component.clone())
    }
}

#[allow(clippy::too_many_arguments)]
fn component(
    id: u64,
    name: &str,
    kind: ComponentKind,
    business: &str,
    environment: &str,
    status: ComponentStatus,
    address: &str,
    usage: (f64, f64),
    started_at: Option<DateTime<Utc>>,
) -> ComponentRecord {
    ComponentRecord {
        id,
        name: name.to_string(),
        kind,
        business: business.to_string(),
        environment: environment.to_string(),
        status,
        address: address.to_string(),
        cpu_usage: usage.0,
        memory_usage: usage.1,
        started_at,
    }
}

fn default_components(now: DateTime<Utc>) -> Vec<ComponentRecord> {
    use ComponentKind::*;
    use ComponentStatus::*;
    let up = |days: i64| Some(now - Duration::days(days));
    vec![
        component(1, "web-server-01", Server, "电商平台", "production", Running, "10.0.1.10", (42.5, 63.1), up(32)),
        component(2, "order-service", Service, "电商平台", "production", Running, "10.0.1.21", (35.0, 51.7), up(12)),
        component(3, "mysql-master", Database, "电商平台", "production", Warning, "10.0.2.5", (78.2, 85.4), up(90)),
        component(4, "core-switch-a", Network, "基础网络", "production", Running, "10.0.0.1", (12.3, 30.0), up(200)),
        component(5, "payment-gateway", Service, "支付系统", "staging", Stopped, "10.1.1.8", (0.0, 0.0), None),
        component(6, "log-collector", Server, "运维平台", "development", Error, "10.2.0.15", (95.1, 91.0), up(2)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_filters_by_environment_and_status() {
        let inventory = InventoryManager::with_defaults();
        assert_eq!(inventory.list(None, None).len(), 6);
        assert_eq!(inventory.list(Some("PRODUCTION"), None).len(), 4);
        let stopped = inventory.list(None, Some(ComponentStatus::Stopped));
        assert_eq!(stopped.len(), 1);
        assert_eq!(stopped[0].name, "payment-gateway");
    }

    #[test]
    fn test_start_stop_restart_transitions() {
        let mut inventory = InventoryManager::with_defaults();
        let started = inventory.perform(5, ComponentAction::Start).unwrap();
        assert_eq!(started.status, ComponentStatus::Running);
        assert!(started.started_at.is_some());

        assert!(matches!(
            inventory.perform(5, ComponentAction::Start),
            Err(AppError::TransitionError(_))
        ));

        let stopped = inventory.perform(5, ComponentAction::Stop).unwrap();
        assert_eq!(stopped.status, ComponentStatus::Stopped);
        assert_eq!(stopped.uptime_secs(Utc::now()), 0);
        assert!(inventory.perform(5, ComponentAction::Restart).is_err());

        let restarted = inventory.perform(6, ComponentAction::Restart).unwrap();
        assert_eq!(restarted.status, ComponentStatus::Running);
        assert!(restarted.uptime_secs(Utc::now()) < 60);
    }

    #[test]
    fn test_unknown_component() {
        let mut inventory = InventoryManager::with_defaults();
        assert!(matches!(inventory.get(42), Err(AppError::NotFound { .. })));
        assert!(inventory.perform(42, ComponentAction::Stop).is_err());
    }
}
