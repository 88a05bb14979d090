use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::utils::error::FilterError;

/// Syslog severity, 0 (Emergency) through 7 (Debug)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub enum Severity {
    Emergency = 0,
    Alert = 1,
    Critical = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    Informational = 6,
    Debug = 7,
}

impl Severity {
    pub const ALL: [Severity; 8] = [
        Severity::Emergency,
        Severity::Alert,
        Severity::Critical,
        Severity::Error,
        Severity::Warning,
        Severity::Notice,
        Severity::Informational,
        Severity::Debug,
    ];

    pub fn level(self) -> u8 {
        self as u8
    }

    /// Label shown in the console
    pub fn label(self) -> &'static str {
        match self {
            Severity::Emergency => "紧急",
            Severity::Alert => "警报",
            Severity::Critical => "严重",
            Severity::Error => "错误",
            Severity::Warning => "警告",
            Severity::Notice => "通知",
            Severity::Informational => "信息",
            Severity::Debug => "调试",
        }
    }
}

impl TryFrom<i64> for Severity {
    type Error = FilterError;

    fn try_from(value: i64) -> Result<Self, FilterError> {
        usize::try_from(value)
            .ok()
            .and_then(|idx| Severity::ALL.get(idx).copied())
            .ok_or(FilterError::InvalidSeverity(value))
    }
}

impl From<Severity> for u8 {
    fn from(value: Severity) -> Self {
        value.level()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.level())
    }
}

/// Time window of a filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TimeRange {
    Today,
    Week,
    Month,
    Custom {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

impl TimeRange {
    /// Name stored in the backend `timeRange` column
    pub fn kind(&self) -> &'static str {
        match self {
            TimeRange::Today => "today",
            TimeRange::Week => "week",
            TimeRange::Month => "month",
            TimeRange::Custom { .. } => "custom",
        }
    }

    /// Build from the stored kind and optional explicit bounds
    pub fn from_parts(
        kind: &str,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Self, FilterError> {
        match kind {
            "today" => Ok(TimeRange::Today),
            "week" => Ok(TimeRange::Week),
            "month" => Ok(TimeRange::Month),
            "custom" => match (start, end) {
                (Some(start), Some(end)) if start <= end => Ok(TimeRange::Custom { start, end }),
                (Some(_), Some(_)) => Err(FilterError::InvalidTimeRange(
                    "start time is after end time".to_string(),
                )),
                _ => Err(FilterError::InvalidTimeRange(
                    "custom range needs both start and end".to_string(),
                )),
            },
            other => Err(FilterError::InvalidTimeRange(format!("unknown range '{}'", other))),
        }
    }

    /// Concrete bounds of this range relative to `now`
    pub fn bounds(&self, now: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
        match self {
            TimeRange::Today => (now.date().and_hms_opt(0, 0, 0).unwrap_or(now), now),
            TimeRange::Week => (now - Duration::days(7), now),
            TimeRange::Month => (now - Duration::days(30), now),
            TimeRange::Custom { start, end } => (*start, *end),
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Filter criteria as collected from the log filter form.
///
/// `keyword`, `sourceIP` and `hostname` are always present in the JSON form
/// (possibly `null`). Device types, severities, event ids and the two flags
/// only appear when non-empty or set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,

    #[serde(default)]
    pub keyword: Option<String>,

    #[serde(default, rename = "sourceIP")]
    pub source_ip: Option<String>,

    #[serde(default)]
    pub hostname: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub device_types: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub severities: BTreeSet<Severity>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_ids: Vec<u32>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub alert_only: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub error_only: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_keyword: Option<String>,
}

impl FilterCriteria {
    /// True when nothing would narrow the log list
    pub fn is_empty(&self) -> bool {
        self == &FilterCriteria::default()
    }
}

/// Identifier of a saved filter: numeric for server rows, `local_<millis>`
/// for filters that only exist in local storage
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterId {
    Remote(u64),
    Local(String),
}

impl FilterId {
    pub const LOCAL_PREFIX: &'static str = "local_";

    pub fn new_local(now: DateTime<Utc>) -> Self {
        FilterId::Local(format!("{}{}", Self::LOCAL_PREFIX, now.timestamp_millis()))
    }

    pub fn is_local(&self) -> bool {
        matches!(self, FilterId::Local(_))
    }

    /// Parse an id typed by a user or taken from a URL
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<u64>() {
            Ok(id) => FilterId::Remote(id),
            Err(_) => FilterId::Local(raw.to_string()),
        }
    }
}

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterId::Remote(id) => write!(f, "{}", id),
            FilterId::Local(id) => f.write_str(id),
        }
    }
}

/// Saved filter as stored by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<FilterId>,

    pub filter_name: String,

    #[serde(default)]
    pub user_id: Option<u64>,

    /// `today`, `week`, `month` or `custom`
    #[serde(default)]
    pub time_range: Option<String>,

    #[serde(default)]
    pub start_time: Option<NaiveDateTime>,

    #[serde(default)]
    pub end_time: Option<NaiveDateTime>,

    /// JSON encoded list of CIDRs
    #[serde(default)]
    pub source_ips: Option<String>,

    /// Comma joined device types
    #[serde(default)]
    pub facilities: Option<String>,

    /// Comma joined severity levels
    #[serde(default)]
    pub severities: Option<String>,

    /// Semicolon joined keyword groups
    #[serde(default)]
    pub include_keywords: Option<String>,

    #[serde(default)]
    pub exclude_keywords: Option<String>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Result of a bulk filter import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub total: usize,
    pub success: usize,
    pub fail: usize,
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_severity_serializes_as_integer() {
        assert_eq!(serde_json::to_value(Severity::Warning).unwrap(), json!(4));
        let parsed: Severity = serde_json::from_value(json!(0)).unwrap();
        assert_eq!(parsed, Severity::Emergency);
        assert!(serde_json::from_value::<Severity>(json!(8)).is_err());
        assert!(serde_json::from_value::<Severity>(json!(-1)).is_err());
    }

    #[test]
    fn test_severity_try_from_range() {
        assert_eq!(Severity::try_from(3), Ok(Severity::Error));
        assert_eq!(Severity::try_from(7), Ok(Severity::Debug));
        assert_eq!(Severity::try_from(8), Err(FilterError::InvalidSeverity(8)));
        assert_eq!(u8::from(Severity::Notice), 5);
    }

    #[test]
    fn test_empty_criteria_keeps_nullable_keys() {
        let value = serde_json::to_value(FilterCriteria::default()).unwrap();
        let obj = value.as_object().unwrap();
        assert!(obj["keyword"].is_null());
        assert!(obj["sourceIP"].is_null());
        assert!(obj["hostname"].is_null());
        for absent in ["deviceTypes", "severities", "eventIds", "alertOnly", "errorOnly", "timeRange"] {
            assert!(!obj.contains_key(absent), "{} should be omitted", absent);
        }
    }

    #[test]
    fn test_filter_id_forms() {
        let remote: FilterId = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(remote, FilterId::Remote(42));
        let local: FilterId = serde_json::from_value(json!("local_1700000000000")).unwrap();
        assert!(local.is_local());
        assert_eq!(FilterId::parse("7"), FilterId::Remote(7));
        assert_eq!(FilterId::parse("local_1").to_string(), "local_1");
    }

    #[test]
    fn test_custom_range_requires_ordered_bounds() {
        let a = NaiveDateTime::parse_from_str("2024-03-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let b = NaiveDateTime::parse_from_str("2024-03-02 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        assert!(TimeRange::from_parts("custom", Some(a), Some(b)).is_ok());
        assert!(TimeRange::from_parts("custom", Some(b), Some(a)).is_err());
        assert!(TimeRange::from_parts("custom", Some(a), None).is_err());
        assert_eq!(TimeRange::from_parts("week", None, None).unwrap(), TimeRange::Week);
    }

    #[test]
    fn test_today_bounds_start_at_midnight() {
        let now = NaiveDateTime::parse_from_str("2024-03-01 13:45:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let (start, end) = TimeRange::Today.bounds(now);
        assert_eq!(start.to_string(), "2024-03-01 00:00:00");
        assert_eq!(end, now);
    }
}
