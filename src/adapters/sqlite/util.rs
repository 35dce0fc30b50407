//! Shared row-decoding helpers.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Parse a timestamp column, accepting RFC 3339 and SQLite's default
/// `YYYY-MM-DD HH:MM:SS` form.
pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc));
    }

    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

pub(crate) fn parse_optional_datetime(
    s: Option<&str>,
) -> Result<Option<DateTime<Utc>>, chrono::ParseError> {
    s.map(parse_datetime).transpose()
}
