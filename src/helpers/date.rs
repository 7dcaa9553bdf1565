//! Date helper functions

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

/// Front-matter date formats without an explicit offset
const LOCAL_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Parse a date string in various formats.
///
/// Strings without an offset are interpreted in `tz`.
pub fn parse_date(s: &str, tz: &Tz) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }

    // "2019-05-01 10:30:00 +0200"
    for fmt in ["%Y-%m-%d %H:%M:%S %z", "%Y-%m-%d %H:%M %z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }

    for fmt in LOCAL_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return localize(naive, tz);
        }
    }

    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(day) = NaiveDate::parse_from_str(s, fmt) {
            return start_of_day(day, tz);
        }
    }

    None
}

/// Midnight of `day` in `tz`
pub fn start_of_day(day: NaiveDate, tz: &Tz) -> Option<DateTime<FixedOffset>> {
    localize(day.and_hms_opt(0, 0, 0)?, tz)
}

fn localize(naive: NaiveDateTime, tz: &Tz) -> Option<DateTime<FixedOffset>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
}

/// Format an RFC 3339 date string with a strftime pattern.
///
/// Returns `None` when `value` is not an RFC 3339 date.
pub fn format_rfc3339(value: &str, format: &str) -> Option<String> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|dt| dt.format(format).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_only_in_utc() {
        let dt = parse_date("2019-05-01", &Tz::UTC).unwrap();
        assert_eq!(dt.to_rfc3339(), "2019-05-01T00:00:00+00:00");
    }

    #[test]
    fn test_parse_local_datetime_in_timezone() {
        let dt = parse_date("2019-05-01 10:30:00", &chrono_tz::Europe::Berlin).unwrap();
        assert_eq!(dt.to_rfc3339(), "2019-05-01T10:30:00+02:00");
    }

    #[test]
    fn test_parse_explicit_offset_wins() {
        let dt = parse_date("2019-05-01 10:30:00 -0500", &chrono_tz::Europe::Berlin).unwrap();
        assert_eq!(dt.to_rfc3339(), "2019-05-01T10:30:00-05:00");
        let dt = parse_date("2019-05-01T10:30:00Z", &Tz::UTC).unwrap();
        assert_eq!(dt.format("%H:%M").to_string(), "10:30");
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_date("last tuesday", &Tz::UTC).is_none());
    }

    #[test]
    fn test_format_rfc3339() {
        assert_eq!(
            format_rfc3339("2019-05-01T00:00:00+00:00", "%B %-d, %Y").as_deref(),
            Some("May 1, 2019")
        );
        assert!(format_rfc3339("yesterday", "%Y").is_none());
    }
}
