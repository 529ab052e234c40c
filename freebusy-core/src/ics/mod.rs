//! iCalendar parsing.
//!
//! Turns the text of one calendar object into event records according to RFC 5545.

mod parse;

pub use parse::parse_events;
