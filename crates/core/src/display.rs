use chrono::{DateTime, NaiveDateTime};

/// Placeholder shown when a timestamp is missing.
pub const NOT_AVAILABLE: &str = "N/A";

/// Render an upstream RFC 3339 timestamp as `15 Jan 2024`.
/// Missing or empty input yields `"N/A"`; unparseable input is returned unchanged.
pub fn format_capture_time(value: Option<&str>) -> String {
    match value.filter(|s| !s.is_empty()) {
        None => NOT_AVAILABLE.to_string(),
        Some(s) => match parse_timestamp(s) {
            Some(dt) => dt.format("%d %b %Y").to_string(),
            None => s.to_string(),
        },
    }
}

/// Render a stored `updated_at` value as `YYYY-MM-DD HH:MM`, falling back to the raw value.
pub fn format_last_updated(value: &str) -> String {
    match parse_timestamp(value) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => value.to_string(),
    }
}

/// Accepts RFC 3339 (with `Z` or an offset) and naive ISO-8601 date-times.
/// Offsets are dropped: the wall-clock time as written is what gets displayed.
fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_capture_time() {
        assert_eq!(format_capture_time(Some("2024-01-15T10:30:00Z")), "15 Jan 2024");
        assert_eq!(format_capture_time(Some("2023-12-25T00:00:00Z")), "25 Dec 2023");
        assert_eq!(format_capture_time(None), "N/A");
        assert_eq!(format_capture_time(Some("")), "N/A");
        assert_eq!(format_capture_time(Some("not-a-date")), "not-a-date");
    }

    #[test]
    fn test_format_last_updated() {
        assert_eq!(format_last_updated("2024-01-15T10:30:12.123456"), "2024-01-15 10:30");
        assert_eq!(format_last_updated("2024-01-15T10:30:12+02:00"), "2024-01-15 10:30");
        assert_eq!(format_last_updated("2024-01-15T10:30:12Z"), "2024-01-15 10:30");
        assert_eq!(format_last_updated("yesterday"), "yesterday");
    }
}
