//! Conversion between the log filter form, [`FilterCriteria`] and the
//! backend [`PersistedFilter`] row.
//!
//! The row shape is narrower than the form: hostname and event ids have no
//! column, only the first source CIDR is read back and its mask is dropped.

use chrono::NaiveDateTime;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::IpAddr;

use crate::models::filter::{FilterCriteria, PersistedFilter, Severity, TimeRange};
use crate::utils::error::FilterError;

/// Keywords injected into `includeKeywords` for the alert-only flag
pub const ALERT_KEYWORDS: &str = "alert,warning,critical";

/// Keywords injected into `includeKeywords` for the error-only flag
pub const ERROR_KEYWORDS: &str = "error,failed,exception";

const KEYWORD_SEPARATOR: char = ';';
const LIST_SEPARATOR: char = ',';

const FORM_DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Raw values of the filter form controls
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterForm {
    /// Selected option of the time range dropdown; empty for none
    pub time_range: String,
    pub start_time: String,
    pub end_time: String,
    pub keyword: String,
    #[serde(rename = "sourceIP")]
    pub source_ip: String,
    pub hostname: String,
    /// Values of the checked device-type boxes
    pub device_types: Vec<String>,
    /// Values of the checked severity boxes
    pub severities: Vec<String>,
    /// Comma or whitespace separated event ids
    pub event_ids: String,
    pub alert_only: bool,
    pub error_only: bool,
    pub exclude_keyword: String,
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_form_datetime(value: &str) -> Result<Option<NaiveDateTime>, FilterError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    FORM_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(Some)
        .ok_or_else(|| FilterError::InvalidTimeRange(format!("unparseable time '{}'", value)))
}

/// Accepts a bare address or `address/prefix`
pub fn validate_source_ip(value: &str) -> Result<(), FilterError> {
    let invalid = || FilterError::InvalidSourceIp(value.to_string());
    let (addr, prefix) = match value.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix)),
        None => (value, None),
    };
    let ip: IpAddr = addr.parse().map_err(|_| invalid())?;
    if let Some(prefix) = prefix {
        let bits: u8 = prefix.parse().map_err(|_| invalid())?;
        let max = if ip.is_ipv4() { 32 } else { 128 };
        if bits > max {
            return Err(invalid());
        }
    }
    Ok(())
}

fn parse_severity(raw: &str) -> Result<Severity, FilterError> {
    let level: i64 = raw
        .trim()
        .parse()
        .map_err(|_| FilterError::InvalidSeverity(-1))?;
    Severity::try_from(level)
}

fn parse_event_ids(raw: &str) -> Result<Vec<u32>, FilterError> {
    raw.split(|c: char| c == LIST_SEPARATOR || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<u32>()
                .map_err(|_| FilterError::InvalidEventId(token.to_string()))
        })
        .collect()
}

/// Read the form controls into criteria
pub fn collect(form: &FilterForm) -> Result<FilterCriteria, FilterError> {
    // the start/end inputs only count for a custom range
    let time_range = match form.time_range.trim() {
        "" => None,
        kind @ "custom" => Some(TimeRange::from_parts(
            kind,
            parse_form_datetime(&form.start_time)?,
            parse_form_datetime(&form.end_time)?,
        )?),
        kind => Some(TimeRange::from_parts(kind, None, None)?),
    };

    let source_ip = non_blank(&form.source_ip);
    if let Some(ip) = &source_ip {
        validate_source_ip(ip)?;
    }

    let device_types: BTreeSet<String> = form
        .device_types
        .iter()
        .filter_map(|t| non_blank(t))
        .collect();

    let severities = form
        .severities
        .iter()
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_severity(s))
        .collect::<Result<BTreeSet<_>, _>>()?;

    Ok(FilterCriteria {
        time_range,
        keyword: non_blank(&form.keyword),
        source_ip,
        hostname: non_blank(&form.hostname),
        device_types,
        severities,
        event_ids: parse_event_ids(&form.event_ids)?,
        alert_only: form.alert_only,
        error_only: form.error_only,
        exclude_keyword: non_blank(&form.exclude_keyword),
    })
}

/// Inverse of [`collect`], used when a saved filter is replayed onto the form
pub fn to_form(criteria: &FilterCriteria) -> FilterForm {
    let fmt = FORM_DATETIME_FORMATS[1];
    let (start_time, end_time) = match &criteria.time_range {
        Some(TimeRange::Custom { start, end }) => {
            (start.format(fmt).to_string(), end.format(fmt).to_string())
        }
        _ => (String::new(), String::new()),
    };

    FilterForm {
        time_range: criteria
            .time_range
            .as_ref()
            .map(|r| r.kind().to_string())
            .unwrap_or_default(),
        start_time,
        end_time,
        keyword: criteria.keyword.clone().unwrap_or_default(),
        source_ip: criteria.source_ip.clone().unwrap_or_default(),
        hostname: criteria.hostname.clone().unwrap_or_default(),
        device_types: criteria.device_types.iter().cloned().collect(),
        severities: criteria.severities.iter().map(|s| s.to_string()).collect(),
        event_ids: criteria
            .event_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(","),
        alert_only: criteria.alert_only,
        error_only: criteria.error_only,
        exclude_keyword: criteria.exclude_keyword.clone().unwrap_or_default(),
    }
}

fn widen_to_cidr(ip: &str) -> String {
    if ip.contains('/') {
        return ip.to_string();
    }
    match ip.parse::<IpAddr>() {
        Ok(IpAddr::V6(_)) => format!("{}/128", ip),
        _ => format!("{}/32", ip),
    }
}

fn join_nonempty<I, T>(items: I, separator: char) -> Option<String>
where
    I: IntoIterator<Item = T>,
    T: ToString,
{
    let separator = separator.to_string();
    let joined = items
        .into_iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(separator.as_str());
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

fn ends_with_group(text: &str, group: &str) -> bool {
    text == group || text.ends_with(&format!("{}{}", KEYWORD_SEPARATOR, group))
}

/// Drop a trailing `;group` (or the whole text when it is the group)
fn strip_group<'a>(text: &'a str, group: &str) -> Option<&'a str> {
    if text == group {
        Some("")
    } else if ends_with_group(text, group) {
        Some(&text[..text.len() - group.len() - 1])
    } else {
        None
    }
}

/// `includeKeywords` layout: the keyword as typed, then the alert group,
/// then the error group, joined with `;`.
///
/// A keyword that ends with `;` or with a flag group gets one extra `;`
/// so the decoder cannot mistake its tail for a flag.
fn encode_keywords(keyword: Option<&str>, alert_only: bool, error_only: bool) -> Option<String> {
    let mut groups: Vec<String> = Vec::new();
    if let Some(keyword) = keyword.filter(|k| !k.is_empty()) {
        let ambiguous = keyword.ends_with(KEYWORD_SEPARATOR)
            || keyword.ends_with(ALERT_KEYWORDS)
            || keyword.ends_with(ERROR_KEYWORDS);
        if ambiguous {
            groups.push(format!("{}{}", keyword, KEYWORD_SEPARATOR));
        } else {
            groups.push(keyword.to_string());
        }
    }
    if alert_only {
        groups.push(ALERT_KEYWORDS.to_string());
    }
    if error_only {
        groups.push(ERROR_KEYWORDS.to_string());
    }
    join_nonempty(groups, KEYWORD_SEPARATOR)
}

/// Inverse of [`encode_keywords`]. Flag groups are only taken off the
/// tail; whatever precedes them is the keyword, byte for byte.
fn decode_keywords(raw: &str) -> (Option<String>, bool, bool) {
    let mut rest = raw;
    let error_only = match strip_group(rest, ERROR_KEYWORDS) {
        Some(head) => {
            rest = head;
            true
        }
        None => false,
    };
    let alert_only = match strip_group(rest, ALERT_KEYWORDS) {
        Some(head) => {
            rest = head;
            true
        }
        None => false,
    };
    let keyword = rest.strip_suffix(KEYWORD_SEPARATOR).unwrap_or(rest);
    let keyword = if keyword.is_empty() {
        None
    } else {
        Some(keyword.to_string())
    };
    (keyword, alert_only, error_only)
}

/// Convert criteria into the backend row shape
pub fn to_backend_row(
    criteria: &FilterCriteria,
    name: &str,
    user_id: Option<u64>,
) -> Result<PersistedFilter, FilterError> {
    let source_ips = criteria
        .source_ip
        .as_deref()
        .map(|ip| serde_json::to_string(&[widen_to_cidr(ip)]))
        .transpose()
        .map_err(|e| FilterError::MalformedRow {
            field: "sourceIps",
            reason: e.to_string(),
        })?;

    let include_keywords = encode_keywords(
        criteria.keyword.as_deref(),
        criteria.alert_only,
        criteria.error_only,
    );

    let (start_time, end_time) = match &criteria.time_range {
        Some(TimeRange::Custom { start, end }) => (Some(*start), Some(*end)),
        _ => (None, None),
    };

    Ok(PersistedFilter {
        id: None,
        filter_name: name.to_string(),
        user_id,
        time_range: criteria.time_range.as_ref().map(|r| r.kind().to_string()),
        start_time,
        end_time,
        source_ips,
        facilities: join_nonempty(&criteria.device_types, LIST_SEPARATOR),
        severities: join_nonempty(&criteria.severities, LIST_SEPARATOR),
        include_keywords,
        exclude_keywords: criteria.exclude_keyword.clone(),
        created_at: None,
        updated_at: None,
    })
}

/// Convert a backend row back into criteria.
///
/// Trailing synthetic flag groups are turned back into `alert_only` /
/// `error_only`. Hostname and event ids are not stored, and
/// only the first source CIDR survives, without its mask.
pub fn from_backend_row(row: &PersistedFilter) -> Result<FilterCriteria, FilterError> {
    let time_range = row
        .time_range
        .as_deref()
        .filter(|kind| !kind.is_empty())
        .map(|kind| TimeRange::from_parts(kind, row.start_time, row.end_time))
        .transpose()?;

    let source_ip = match row.source_ips.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => {
            let cidrs: Vec<String> =
                serde_json::from_str(raw).map_err(|e| FilterError::MalformedRow {
                    field: "sourceIps",
                    reason: e.to_string(),
                })?;
            if cidrs.len() > 1 {
                debug!(
                    "Filter '{}' stores {} source CIDRs, only the first is loaded",
                    row.filter_name,
                    cidrs.len()
                );
            }
            cidrs
                .into_iter()
                .next()
                .map(|cidr| cidr.split('/').next().unwrap_or_default().to_string())
                .filter(|ip| !ip.is_empty())
        }
    };

    let device_types = row
        .facilities
        .as_deref()
        .unwrap_or_default()
        .split(LIST_SEPARATOR)
        .filter_map(non_blank)
        .collect();

    let severities = row
        .severities
        .as_deref()
        .unwrap_or_default()
        .split(LIST_SEPARATOR)
        .filter(|s| !s.trim().is_empty())
        .map(parse_severity)
        .collect::<Result<BTreeSet<_>, _>>()?;

    let (keyword, alert_only, error_only) =
        decode_keywords(row.include_keywords.as_deref().unwrap_or_default());

    Ok(FilterCriteria {
        time_range,
        keyword,
        source_ip,
        hostname: None,
        device_types,
        severities,
        event_ids: Vec::new(),
        alert_only,
        error_only,
        exclude_keyword: row.exclude_keywords.as_deref().and_then(non_blank),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form() -> FilterForm {
        FilterForm {
            time_range: "week".to_string(),
            keyword: " link down ".to_string(),
            source_ip: "10.0.0.5".to_string(),
            hostname: "core-sw-01".to_string(),
            device_types: vec!["NETWORK".to_string(), "SERVER".to_string()],
            severities: vec!["3".to_string(), "1".to_string()],
            event_ids: "4625, 4624".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_collect_trims_and_parses() {
        let criteria = collect(&form()).unwrap();
        assert_eq!(criteria.time_range, Some(TimeRange::Week));
        assert_eq!(criteria.keyword.as_deref(), Some("link down"));
        assert_eq!(criteria.source_ip.as_deref(), Some("10.0.0.5"));
        assert_eq!(
            criteria.severities.iter().map(|s| s.level()).collect::<Vec<_>>(),
            vec![1, 3]
        );
        assert_eq!(criteria.event_ids, vec![4625, 4624]);
        assert!(!criteria.alert_only);
    }

    #[test]
    fn test_collect_blank_form_keeps_null_keys_and_omits_empty_sets() {
        let criteria = collect(&FilterForm::default()).unwrap();
        let value = serde_json::to_value(&criteria).unwrap();
        assert_eq!(
            value,
            json!({ "keyword": null, "sourceIP": null, "hostname": null })
        );
    }

    #[test]
    fn test_collect_rejects_bad_input() {
        let mut bad = form();
        bad.source_ip = "10.0.0.300".to_string();
        assert_eq!(
            collect(&bad).unwrap_err(),
            FilterError::InvalidSourceIp("10.0.0.300".to_string())
        );

        let mut bad = form();
        bad.severities = vec!["9".to_string()];
        assert_eq!(collect(&bad).unwrap_err(), FilterError::InvalidSeverity(9));

        let mut bad = form();
        bad.event_ids = "12,abc".to_string();
        assert_eq!(collect(&bad).unwrap_err(), FilterError::InvalidEventId("abc".to_string()));

        let mut bad = form();
        bad.time_range = "custom".to_string();
        bad.start_time = "2024-03-02T10:00".to_string();
        bad.end_time = "2024-03-01T10:00".to_string();
        assert!(matches!(collect(&bad), Err(FilterError::InvalidTimeRange(_))));
    }

    #[test]
    fn test_to_backend_row_shapes_columns() {
        let mut criteria = collect(&form()).unwrap();
        criteria.alert_only = true;
        criteria.error_only = true;
        let row = to_backend_row(&criteria, "core", Some(3)).unwrap();

        assert_eq!(row.time_range.as_deref(), Some("week"));
        assert_eq!(row.source_ips.as_deref(), Some(r#"["10.0.0.5/32"]"#));
        assert_eq!(row.facilities.as_deref(), Some("NETWORK,SERVER"));
        assert_eq!(row.severities.as_deref(), Some("1,3"));
        assert_eq!(
            row.include_keywords.as_deref(),
            Some("link down;alert,warning,critical;error,failed,exception")
        );
        assert_eq!(row.user_id, Some(3));
    }

    #[test]
    fn test_ipv6_widens_to_128() {
        let criteria = FilterCriteria {
            source_ip: Some("fe80::1".to_string()),
            ..Default::default()
        };
        let row = to_backend_row(&criteria, "v6", None).unwrap();
        assert_eq!(row.source_ips.as_deref(), Some(r#"["fe80::1/128"]"#));
    }

    #[test]
    fn test_round_trip_keeps_keyword_range_and_severities() {
        let mut source = form();
        source.time_range = "custom".to_string();
        source.start_time = "2024-03-01T08:00".to_string();
        source.end_time = "2024-03-01T18:30".to_string();
        source.alert_only = true;
        let criteria = collect(&source).unwrap();

        let restored = from_backend_row(&to_backend_row(&criteria, "day shift", None).unwrap()).unwrap();
        assert_eq!(restored.keyword, criteria.keyword);
        assert_eq!(restored.time_range, criteria.time_range);
        assert_eq!(restored.severities, criteria.severities);
        assert_eq!(restored.source_ip, criteria.source_ip);
        assert!(restored.alert_only);
        assert!(!restored.error_only);
        // not stored by the backend row
        assert_eq!(restored.hostname, None);
        assert!(restored.event_ids.is_empty());
    }

    #[test]
    fn test_keyword_text_survives_storage_exactly() {
        let cases = [
            ("disk; full", false, false),
            ("a;", false, false),
            ("a;", true, false),
            (ERROR_KEYWORDS, false, false),
            (ALERT_KEYWORDS, true, false),
            ("x;alert,warning,critical", false, true),
            ("plain", true, true),
        ];
        for (keyword, alert_only, error_only) in cases {
            let criteria = FilterCriteria {
                keyword: Some(keyword.to_string()),
                alert_only,
                error_only,
                ..Default::default()
            };
            let restored = from_backend_row(&to_backend_row(&criteria, "k", None).unwrap()).unwrap();
            assert_eq!(restored.keyword.as_deref(), Some(keyword), "keyword {:?}", keyword);
            assert_eq!(restored.alert_only, alert_only, "alert flag for {:?}", keyword);
            assert_eq!(restored.error_only, error_only, "error flag for {:?}", keyword);
        }
    }

    #[test]
    fn test_flag_only_keywords_decode_to_flags() {
        let (keyword, alert_only, error_only) =
            decode_keywords("alert,warning,critical;error,failed,exception");
        assert_eq!(keyword, None);
        assert!(alert_only && error_only);

        // a flag group in the middle is part of the keyword
        let (keyword, alert_only, error_only) = decode_keywords("error,failed,exception;disk");
        assert_eq!(keyword.as_deref(), Some("error,failed,exception;disk"));
        assert!(!alert_only && !error_only);
    }

    #[test]
    fn test_preset_range_ignores_leftover_custom_times() {
        let mut source = form();
        source.time_range = "week".to_string();
        source.start_time = "not a time".to_string();
        source.end_time = "2024-03-01T10:00".to_string();
        assert_eq!(collect(&source).unwrap().time_range, Some(TimeRange::Week));

        source.time_range = "custom".to_string();
        assert!(matches!(collect(&source), Err(FilterError::InvalidTimeRange(_))));
    }

    #[test]
    fn test_from_backend_row_takes_first_cidr_without_mask() {
        let row: PersistedFilter = serde_json::from_value(json!({
            "filterName": "edge",
            "timeRange": "today",
            "sourceIps": "[\"192.168.0.0/24\", \"10.1.1.1/32\"]",
            "severities": "4",
            "includeKeywords": "error,failed,exception"
        }))
        .unwrap();
        let criteria = from_backend_row(&row).unwrap();
        assert_eq!(criteria.source_ip.as_deref(), Some("192.168.0.0"));
        assert_eq!(criteria.keyword, None);
        assert!(criteria.error_only);
        assert_eq!(criteria.severities.into_iter().collect::<Vec<_>>(), vec![Severity::Warning]);
    }

    #[test]
    fn test_from_backend_row_rejects_malformed_ip_list() {
        let row = PersistedFilter {
            source_ips: Some("10.0.0.1/32".to_string()),
            ..to_backend_row(&FilterCriteria::default(), "x", None).unwrap()
        };
        assert!(matches!(
            from_backend_row(&row),
            Err(FilterError::MalformedRow { field: "sourceIps", .. })
        ));
    }

    #[test]
    fn test_to_form_replays_criteria() {
        let criteria = collect(&form()).unwrap();
        let replayed = collect(&to_form(&criteria)).unwrap();
        assert_eq!(replayed, criteria);
    }
}
