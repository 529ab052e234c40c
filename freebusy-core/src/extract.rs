//! Event extraction from fetched calendar objects.
//!
//! Each object's ICS text is located through an ordered list of payload
//! strategies, parsed, and tagged with its collection's name. A broken
//! object is reported in [`Extraction::failures`] and never stops the batch.

use crate::error::FreeBusyError;
use crate::event::{DEFAULT_CALENDAR_NAME, EventRecord};
use crate::fetcher::{Payload, RawCalendar};
use crate::ics::parse_events;

/// Header every iCalendar stream starts with.
const ICS_HEADER: &str = "BEGIN:VCALENDAR";

type PayloadStrategy = fn(&Payload) -> Option<String>;

/// Tried in order; the first one returning text wins.
const PAYLOAD_STRATEGIES: [PayloadStrategy; 3] = [text_payload, bytes_payload, property_payload];

fn text_payload(payload: &Payload) -> Option<String> {
    match payload {
        Payload::Text(text) => Some(text.clone()),
        _ => None,
    }
}

fn bytes_payload(payload: &Payload) -> Option<String> {
    match payload {
        Payload::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}

fn property_payload(payload: &Payload) -> Option<String> {
    match payload {
        Payload::Properties(props) => props
            .iter()
            .filter_map(|(_, value)| value.as_str())
            .find(|value| value.starts_with(ICS_HEADER))
            .map(str::to_string),
        _ => None,
    }
}

/// Locate the ICS text inside a payload, if there is any.
pub fn locate_ics(payload: &Payload) -> Option<String> {
    PAYLOAD_STRATEGIES.iter().find_map(|strategy| strategy(payload))
}

/// An object that could not be turned into event records.
#[derive(Debug, Clone)]
pub struct ExtractFailure {
    pub href: String,
    pub calendar_name: String,
    pub error: FreeBusyError,
}

/// Outcome of extracting a whole fetch.
#[derive(Debug, Default)]
pub struct Extraction {
    pub events: Vec<EventRecord>,
    pub failures: Vec<ExtractFailure>,
}

/// Extract event records from every object of every calendar.
pub fn extract_events(calendars: &[RawCalendar]) -> Extraction {
    let mut extraction = Extraction::default();

    for calendar in calendars {
        let calendar_name = calendar
            .display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_CALENDAR_NAME);

        for object in &calendar.objects {
            // Objects without calendar data are ordinary on CalDAV servers
            let Some(ics) = object.payload.as_ref().and_then(locate_ics) else {
                continue;
            };

            match parse_events(&ics, calendar_name) {
                Ok(events) => extraction.events.extend(events),
                Err(error) => extraction.failures.push(ExtractFailure {
                    href: object.href.clone(),
                    calendar_name: calendar_name.to_string(),
                    error,
                }),
            }
        }
    }

    extraction
}
