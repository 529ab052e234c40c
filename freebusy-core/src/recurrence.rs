//! Expansion of event records into busy intervals inside a query window.
//!
//! One-off events overlap-test against the window. Recurring events are
//! expanded with the rrule crate, anchored at the event's own start, and every
//! occurrence inherits the template's duration.

use chrono::{DateTime, Duration, Utc};
use rrule::RRuleSet;
use tracing::warn;

use crate::error::{FreeBusyError, FreeBusyResult};
use crate::event::{BusyInterval, EventRecord, Recurrence};

/// Per-call ceiling of the rrule engine.
const MAX_OCCURRENCES: u16 = u16::MAX;

/// Build the iCalendar text block the rrule crate parses.
fn build_rrule_string(start: &DateTime<Utc>, recurrence: &Recurrence) -> FreeBusyResult<String> {
    match &recurrence.tzid {
        Some(tzid) => {
            let tz: chrono_tz::Tz = tzid
                .parse()
                .map_err(|_| FreeBusyError::InvalidRule(format!("unknown timezone '{}'", tzid)))?;
            Ok(format!(
                "DTSTART;TZID={}:{}\nRRULE:{}",
                tzid,
                start.with_timezone(&tz).format("%Y%m%dT%H%M%S"),
                recurrence.rrule
            ))
        }
        None => Ok(format!(
            "DTSTART:{}\nRRULE:{}",
            start.format("%Y%m%dT%H%M%SZ"),
            utc_until(&recurrence.rrule)
        )),
    }
}

/// Rewrite a DATE or floating `UNTIL` as UTC, to match a UTC `DTSTART`.
///
/// All-day and floating events are anchored in UTC, and the rrule crate rejects
/// an `UNTIL` whose form differs from `DTSTART`.
fn utc_until(rrule: &str) -> String {
    rrule
        .split(';')
        .map(|part| match part.split_once('=') {
            Some((key, value)) if key.eq_ignore_ascii_case("UNTIL") => {
                if value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit()) {
                    format!("{}={}T000000Z", key, value)
                } else if value.contains('T') && !value.ends_with(['Z', 'z']) {
                    format!("{}={}Z", key, value)
                } else {
                    part.to_string()
                }
            }
            _ => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// End of an occurrence, capped at the last representable instant.
fn occurrence_end(start: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    start
        .checked_add_signed(duration)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Expand one event into the busy intervals that fall inside `[window_start, window_end]`.
///
/// A one-off event yields its own interval when it overlaps the window, touching
/// endpoints included. A recurring event yields one interval per occurrence
/// whose start lies inside the window. A reversed window yields nothing.
///
/// # Errors
/// Returns `FreeBusyError::InvalidRule` if the event's RRULE cannot be parsed.
pub fn expand_event(
    event: &EventRecord,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> FreeBusyResult<Vec<BusyInterval>> {
    let Some(recurrence) = &event.recurrence else {
        if event.end >= window_start && event.start <= window_end {
            return Ok(vec![BusyInterval::new(event.start, event.end)]);
        }
        return Ok(Vec::new());
    };

    if window_start > window_end {
        return Ok(Vec::new());
    }

    let rrule_str = build_rrule_string(&event.start, recurrence)?;
    let rrule_set: RRuleSet = rrule_str.parse().map_err(|e| {
        FreeBusyError::InvalidRule(format!("{} (event '{}')", e, event.label()))
    })?;

    // Widen by a second so the engine's bounds cannot drop boundary occurrences;
    // the exact inclusive test happens below. No occurrence precedes the anchor.
    let tz: rrule::Tz = Utc.into();
    let after = window_start
        .max(event.start)
        .checked_sub_signed(Duration::seconds(1))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
        .with_timezone(&tz);
    let before = window_end
        .checked_add_signed(Duration::seconds(1))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
        .with_timezone(&tz);

    let result = rrule_set.after(after).before(before).all(MAX_OCCURRENCES);
    if result.limited {
        warn!(
            event = event.label(),
            limit = MAX_OCCURRENCES,
            "recurrence expansion truncated"
        );
    }

    let duration = event.duration();

    Ok(result
        .dates
        .iter()
        .map(|dt| dt.with_timezone(&Utc))
        .filter(|dt| *dt >= window_start && *dt <= window_end)
        .filter(|dt| !recurrence.exdates.contains(dt))
        .map(|dt| BusyInterval::new(dt, occurrence_end(dt, duration)))
        .collect())
}

/// An event whose expansion failed.
#[derive(Debug, Clone)]
pub struct ExpansionFailure {
    pub event: EventRecord,
    pub error: FreeBusyError,
}

/// Expand every event, keeping input order, and report failures separately.
pub fn expand_all<'a>(
    events: impl IntoIterator<Item = &'a EventRecord>,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> (Vec<BusyInterval>, Vec<ExpansionFailure>) {
    let mut intervals = Vec::new();
    let mut failures = Vec::new();

    for event in events {
        match expand_event(event, window_start, window_end) {
            Ok(expanded) => intervals.extend(expanded),
            Err(error) => failures.push(ExpansionFailure {
                event: event.clone(),
                error,
            }),
        }
    }

    (intervals, failures)
}
