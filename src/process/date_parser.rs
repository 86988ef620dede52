use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value as Json;

use crate::schema::Value;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
];

/// Parse an ISO-8601 style timestamp → micros UTC.
///
/// Offsets are honoured when present; naive datetimes and bare dates are
/// taken as UTC.
pub fn parse_timestamp_micros(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_micros());
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc().timestamp_micros());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc().timestamp_micros())
}

/// Cleaning step for timestamp columns given as strings.
pub fn clean_timestamp(raw: Option<&Json>) -> Result<Option<Value>> {
    let raw = raw.ok_or_else(|| anyhow!("no timestamp to parse"))?;
    let s = raw
        .as_str()
        .ok_or_else(|| anyhow!("timestamp must be a string, got {}", raw))?;
    parse_timestamp_micros(s)
        .map(|micros| Some(Value::Timestamp(micros)))
        .ok_or_else(|| anyhow!("unrecognised timestamp {:?}", s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // 2017-02-23T15:06:12Z
    const BASE_SECS: i64 = 1_487_862_372;

    #[test]
    fn parses_rfc3339_with_offset() {
        assert_eq!(
            parse_timestamp_micros("2017-02-23T15:06:12.503Z"),
            Some(BASE_SECS * 1_000_000 + 503_000)
        );
        assert_eq!(
            parse_timestamp_micros("2017-02-23T16:06:12+01:00"),
            Some(BASE_SECS * 1_000_000)
        );
    }

    #[test]
    fn parses_naive_forms_as_utc() {
        assert_eq!(
            parse_timestamp_micros("2017-02-23T15:06:12"),
            Some(BASE_SECS * 1_000_000)
        );
        assert_eq!(
            parse_timestamp_micros("2017-02-23 15:06:12.5"),
            Some(BASE_SECS * 1_000_000 + 500_000)
        );
        assert_eq!(
            parse_timestamp_micros("2017-02-23"),
            Some((BASE_SECS - (15 * 3600 + 6 * 60 + 12)) * 1_000_000)
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_timestamp_micros("yesterday"), None);
        assert!(clean_timestamp(Some(&json!("not a date"))).is_err());
        assert!(clean_timestamp(Some(&json!(12))).is_err());
        assert!(clean_timestamp(None).is_err());
    }
}
