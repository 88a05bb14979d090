use lazy_static::lazy_static;

use crate::models::filter::{FilterCriteria, Severity, TimeRange};

pub const ERROR_FILTER_NAME: &str = "错误日志过滤器";
pub const WARNING_FILTER_NAME: &str = "警告日志过滤器";
pub const INFO_FILTER_NAME: &str = "信息日志过滤器";
pub const DEFAULT_FILTER_NAME: &str = "自定义过滤器";

lazy_static! {
    /// Keyword category table, checked in order; the first hit names the filter
    static ref KEYWORD_CATEGORIES: Vec<(Vec<&'static str>, &'static str)> = vec![
        (vec!["network", "网络"], "网络日志过滤器"),
        (vec!["security", "安全"], "安全日志过滤器"),
        (vec!["system", "系统"], "系统日志过滤器"),
    ];
}

fn name_from_severities(severities: &[Severity]) -> Option<String> {
    let (first, last) = (severities.first()?, severities.last()?);
    let name = if *last <= Severity::Error {
        ERROR_FILTER_NAME.to_string()
    } else if severities == [Severity::Warning] {
        WARNING_FILTER_NAME.to_string()
    } else if *first >= Severity::Notice {
        INFO_FILTER_NAME.to_string()
    } else {
        let labels: Vec<&str> = severities.iter().map(|s| s.label()).collect();
        format!("{}日志过滤器", labels.join("/"))
    };
    Some(name)
}

fn name_from_keyword(keyword: &str) -> Option<&'static str> {
    let keyword = keyword.to_lowercase();
    KEYWORD_CATEGORIES
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| keyword.contains(n)))
        .map(|(_, name)| *name)
}

fn name_from_time_range(range: &TimeRange) -> &'static str {
    match range {
        TimeRange::Today => "今日日志过滤器",
        TimeRange::Week => "本周日志过滤器",
        TimeRange::Month => "本月日志过滤器",
        TimeRange::Custom { .. } => "自定义时间段过滤器",
    }
}

/// Suggest a display name for criteria the user saves without naming.
///
/// Severity tier wins over keyword category, which wins over the time range.
pub fn identify_filter_name(criteria: &FilterCriteria) -> String {
    let severities: Vec<Severity> = criteria.severities.iter().copied().collect();
    if let Some(name) = name_from_severities(&severities) {
        return name;
    }
    if let Some(name) = criteria.keyword.as_deref().and_then(name_from_keyword) {
        return name.to_string();
    }
    if let Some(range) = &criteria.time_range {
        return name_from_time_range(range).to_string();
    }
    DEFAULT_FILTER_NAME.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_levels(levels: &[i64]) -> FilterCriteria {
        FilterCriteria {
            severities: levels
                .iter()
                .map(|l| Severity::try_from(*l).unwrap())
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_severity_tiers() {
        assert_eq!(identify_filter_name(&with_levels(&[0, 1, 2])), "错误日志过滤器");
        assert_eq!(identify_filter_name(&with_levels(&[3])), "错误日志过滤器");
        assert_eq!(identify_filter_name(&with_levels(&[4])), "警告日志过滤器");
        assert_eq!(identify_filter_name(&with_levels(&[5, 7])), "信息日志过滤器");
        assert_eq!(identify_filter_name(&with_levels(&[3, 4])), "错误/警告日志过滤器");
        assert_eq!(identify_filter_name(&with_levels(&[4, 6])), "警告/信息日志过滤器");
    }

    #[test]
    fn test_keyword_categories() {
        let named = |kw: &str| {
            identify_filter_name(&FilterCriteria {
                keyword: Some(kw.to_string()),
                ..Default::default()
            })
        };
        assert_eq!(named("network issue"), "网络日志过滤器");
        assert_eq!(named("Security audit"), "安全日志过滤器");
        assert_eq!(named("系统重启"), "系统日志过滤器");
        assert_eq!(named("disk full"), DEFAULT_FILTER_NAME);
    }

    #[test]
    fn test_severity_beats_keyword_and_range_is_fallback() {
        let mut criteria = with_levels(&[4]);
        criteria.keyword = Some("network".to_string());
        assert_eq!(identify_filter_name(&criteria), "警告日志过滤器");

        let criteria = FilterCriteria {
            time_range: Some(TimeRange::Week),
            keyword: Some("disk".to_string()),
            ..Default::default()
        };
        assert_eq!(identify_filter_name(&criteria), "本周日志过滤器");
        assert_eq!(identify_filter_name(&FilterCriteria::default()), DEFAULT_FILTER_NAME);
    }
}
