//! Core of the freebusy service.
//!
//! This crate answers "when is this calendar busy between two timestamps?"
//! without any HTTP framework:
//! - `extract` turns fetched CalDAV objects into `EventRecord`s
//! - `recurrence` expands records into `BusyInterval`s inside a window
//! - `cache` keeps the last extraction for `CACHE_TTL`
//! - `freebusy` ties them together behind `FreeBusy::handle`
//! - `protocol` holds the request/response shapes the adapters share
//!
//! The upstream server is reached through the `CalendarFetcher` trait.

pub mod cache;
pub mod error;
pub mod event;
pub mod extract;
pub mod fetcher;
pub mod freebusy;
pub mod ics;
pub mod protocol;
pub mod recurrence;
pub mod time;

pub use cache::{CACHE_TTL, EventCache};
pub use error::{FreeBusyError, FreeBusyResult};
pub use event::{BusyInterval, EventRecord, Recurrence};
pub use fetcher::{CalendarFetcher, Payload, RawCalendar, RawObject};
pub use freebusy::{BusyResponse, FreeBusy};
