//! Boundary to the upstream calendar server.
//!
//! A fetcher returns every calendar collection of one account together with
//! the raw objects it contains. Implementations live outside this crate
//! (see `freebusy-provider-icloud`); the core only consumes their output.

use std::future::Future;

use crate::error::FreeBusyResult;

/// A calendar collection as returned by the server.
#[derive(Debug, Clone, Default)]
pub struct RawCalendar {
    pub display_name: Option<String>,
    pub objects: Vec<RawObject>,
}

/// A member resource of a collection.
#[derive(Debug, Clone)]
pub struct RawObject {
    pub href: String,
    /// `None` when the server returned no body for this resource
    pub payload: Option<Payload>,
}

/// The shapes in which a transport may hand over calendar data.
#[derive(Debug, Clone)]
pub enum Payload {
    Text(String),
    Bytes(Vec<u8>),
    /// A property bag, in server order; calendar data is one of its string values
    Properties(Vec<(String, serde_json::Value)>),
}

/// Source of raw calendar objects for one account.
pub trait CalendarFetcher: Send + Sync {
    /// Fetch every collection and its objects.
    ///
    /// Authentication, network and protocol failures are returned as
    /// [`FreeBusyError::Fetch`](crate::FreeBusyError::Fetch), never as partial data.
    fn fetch_calendars(&self) -> impl Future<Output = FreeBusyResult<Vec<RawCalendar>>> + Send;
}
