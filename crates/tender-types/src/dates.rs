//! Date parsing shared by rows whose date columns may carry a time part

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer};

/// Parse `YYYY-MM-DD`, or an RFC 3339 timestamp truncated to its date
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| raw.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()))
}

/// Serde adapter for nullable date columns
pub fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_date))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_forms() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 1);
        assert_eq!(parse_date("2025-03-01"), expected);
        assert_eq!(parse_date("2025-03-01T10:00:00+02:00"), expected);
        assert_eq!(parse_date("2025-03-01T10:00:00.000"), expected);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("soon"), None);
    }
}
