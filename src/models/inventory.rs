use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of inventory component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Server,
    Service,
    Database,
    Network,
}

/// Runtime status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Running,
    Stopped,
    Warning,
    Error,
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComponentStatus::Running => "running",
            ComponentStatus::Stopped => "stopped",
            ComponentStatus::Warning => "warning",
            ComponentStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Lifecycle action requested from the inventory view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentAction {
    Start,
    Stop,
    Restart,
}

/// Server or service shown in the business/component inventory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRecord {
    pub id: u64,
    pub name: String,
    pub kind: ComponentKind,

    /// Business line the component belongs to
    pub business: String,

    /// `production`, `staging`, `development`
    pub environment: String,

    pub status: ComponentStatus,

    /// Host address
    pub address: String,

    pub cpu_usage: f64,
    pub memory_usage: f64,

    /// Last time the component was (re)started
    pub started_at: Option<DateTime<Utc>>,
}

impl ComponentRecord {
    /// Uptime in seconds, zero when stopped
    pub fn uptime_secs(&self, now: DateTime<Utc>) -> i64 {
        match (self.status, self.started_at) {
            (ComponentStatus::Stopped, _) | (_, None) => 0,
            (_, Some(started)) => (now - started).num_seconds().max(0),
        }
    }
}
