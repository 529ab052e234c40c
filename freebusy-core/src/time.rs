//! Timestamp parsing and formatting for the HTTP boundary.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::Serializer;

use crate::error::{FreeBusyError, FreeBusyResult};

/// Naive datetime layouts accepted when the caller omits an offset.
const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Parse an ISO 8601 timestamp into an absolute UTC instant.
///
/// Accepts, in order:
/// - RFC 3339 with `Z` or a numeric offset (`2024-03-01T09:00:00+02:00`)
/// - a naive datetime, read as UTC (`2024-03-01T09:00:00`)
/// - a bare date, read as midnight UTC (`2024-03-01`)
pub fn parse_timestamp(value: &str) -> FreeBusyResult<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| FreeBusyError::InvalidTimestamp(value.to_string()))
}

/// Render an instant as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Serde adapter for [`format_timestamp`].
pub fn serialize_timestamp<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_timestamp(dt))
}
