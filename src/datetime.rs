//! Date/time utilities for cloudfm.

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use chrono_tz::Tz;

/// Placeholder shown when a record has no modification time.
pub const UNKNOWN_TIME: &str = "Unknown";

/// Parse a timestamp sent by the file server.
///
/// Accepts RFC3339 (with any offset and fractional seconds) and the plain
/// `YYYY-MM-DD HH:MM:SS` form, taken as UTC. The zero time emitted for
/// unset values (`0001-01-01T00:00:00Z`) and anything unparseable yield
/// `None`.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let parsed = if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        dt.with_timezone(&Utc)
    } else if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        naive.and_utc()
    } else {
        return None;
    };

    if parsed.year() <= 1 {
        return None;
    }
    Some(parsed)
}

/// Format a DateTime<Utc> to the specified timezone.
///
/// # Arguments
///
/// * `dt` - DateTime in UTC
/// * `timezone` - Timezone name (e.g., "Asia/Tokyo", "UTC")
/// * `format` - Output format string (e.g., "%Y/%m/%d %H:%M")
///
/// # Returns
///
/// Formatted datetime string. An unknown timezone falls back to UTC.
pub fn format_utc_datetime(dt: &DateTime<Utc>, timezone: &str, format: &str) -> String {
    let tz: Tz = match timezone.parse() {
        Ok(tz) => tz,
        Err(_) => return dt.format(format).to_string(),
    };
    dt.with_timezone(&tz).format(format).to_string()
}

/// Format an optional modification time for the file table.
pub fn format_modified(dt: Option<&DateTime<Utc>>, timezone: &str, format: &str) -> String {
    match dt {
        Some(dt) => format_utc_datetime(dt, timezone, format),
        None => UNKNOWN_TIME.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_timestamp_rfc3339_offset() {
        let dt = parse_timestamp("2024-01-15T19:30:00+09:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_timestamp_fractional() {
        let dt = parse_timestamp("2024-01-15T10:30:00.123456789Z").unwrap();
        assert_eq!(dt.format("%H:%M:%S").to_string(), "10:30:00");
    }

    #[test]
    fn test_parse_timestamp_plain() {
        let dt = parse_timestamp("2024-01-15 10:30:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_timestamp_zero_time() {
        assert!(parse_timestamp("0001-01-01T00:00:00Z").is_none());
    }

    #[test]
    fn test_parse_timestamp_invalid() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_format_utc_datetime() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let result = format_utc_datetime(&dt, "Asia/Tokyo", "%Y/%m/%d %H:%M");
        assert_eq!(result, "2024/01/15 19:30"); // UTC+9
    }

    #[test]
    fn test_format_utc_datetime_invalid_timezone() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let result = format_utc_datetime(&dt, "Invalid/Zone", "%Y/%m/%d %H:%M");
        assert_eq!(result, "2024/01/15 10:30");
    }

    #[test]
    fn test_format_modified_unknown() {
        assert_eq!(format_modified(None, "UTC", "%Y"), "Unknown");
    }

    #[test]
    fn test_format_modified_some() {
        let dt = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(
            format_modified(Some(&dt), "UTC", "%Y/%m/%d %H:%M:%S"),
            "2024/12/31 23:59:59"
        );
    }
}
