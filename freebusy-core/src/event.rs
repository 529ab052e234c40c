//! Event records extracted from calendar data, and the busy intervals derived from them.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::time::serialize_timestamp;

/// Label attached to every busy interval. Real titles are never exposed.
pub const BUSY_TITLE: &str = "Busy";

/// Calendar name used when a collection has no display name.
pub const DEFAULT_CALENDAR_NAME: &str = "default";

/// A VEVENT normalized to absolute times.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub uid: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Present for recurring masters only
    pub recurrence: Option<Recurrence>,
    pub calendar_name: String,
}

impl EventRecord {
    /// Length of the template event. Negative when the source data is malformed.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Identifier for log lines.
    pub fn label(&self) -> &str {
        self.uid.as_deref().unwrap_or("(no uid)")
    }
}

/// Recurrence data of a master event.
#[derive(Debug, Clone, PartialEq)]
pub struct Recurrence {
    /// RRULE value without the `RRULE:` prefix, e.g. `FREQ=WEEKLY;BYDAY=MO`
    pub rrule: String,
    /// Occurrence starts removed from the set (EXDATE and overridden instances)
    pub exdates: Vec<DateTime<Utc>>,
    /// IANA zone of the original DTSTART, used to anchor the rule
    pub tzid: Option<String>,
}

/// One occupied slot in the response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusyInterval {
    #[serde(serialize_with = "serialize_timestamp")]
    pub start: DateTime<Utc>,
    #[serde(serialize_with = "serialize_timestamp")]
    pub end: DateTime<Utc>,
    pub title: &'static str,
}

impl BusyInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        BusyInterval {
            start,
            end,
            title: BUSY_TITLE,
        }
    }
}
