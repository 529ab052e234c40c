//! Busy-interval aggregation over the cached event set.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::cache::EventCache;
use crate::error::{FreeBusyError, FreeBusyResult};
use crate::event::BusyInterval;
use crate::fetcher::CalendarFetcher;
use crate::recurrence::expand_all;
use crate::time::parse_timestamp;

/// Body of a successful free/busy answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusyResponse {
    pub busy: Vec<BusyInterval>,
}

/// Answers free/busy queries for one account.
pub struct FreeBusy<F> {
    cache: EventCache<F>,
}

impl<F: CalendarFetcher> FreeBusy<F> {
    pub fn new(cache: EventCache<F>) -> Self {
        FreeBusy { cache }
    }

    /// Busy intervals of every cached event inside `[window_start, window_end]`.
    ///
    /// Intervals are in cache order (calendar, then object), not sorted by time.
    /// Events whose recurrence cannot be expanded are logged and skipped.
    pub async fn busy(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> FreeBusyResult<Vec<BusyInterval>> {
        let events = self.cache.events().await?;

        let (busy, failures) = expand_all(events.iter(), window_start, window_end);
        for failure in &failures {
            warn!(
                event = failure.event.label(),
                calendar = %failure.event.calendar_name,
                error = %failure.error,
                "skipping event with unusable recurrence"
            );
        }

        Ok(busy)
    }

    /// Framework-free entry point shared by the HTTP server and the one-shot handler.
    ///
    /// Missing or empty bounds fail before anything is fetched.
    pub async fn handle(&self, start: Option<&str>, end: Option<&str>) -> FreeBusyResult<BusyResponse> {
        let (Some(start), Some(end)) = (non_empty(start), non_empty(end)) else {
            return Err(FreeBusyError::MissingWindow);
        };

        let window_start = parse_timestamp(start)?;
        let window_end = parse_timestamp(end)?;

        let busy = self.busy(window_start, window_end).await?;
        Ok(BusyResponse { busy })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tests::FakeFetcher;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn freebusy() -> (Arc<FakeFetcher>, FreeBusy<Arc<FakeFetcher>>) {
        let fetcher = Arc::new(FakeFetcher::default());
        let freebusy = FreeBusy::new(EventCache::new(Arc::clone(&fetcher)));
        (fetcher, freebusy)
    }

    #[tokio::test]
    async fn weekly_and_one_off_events_in_first_march_week() {
        let (_, freebusy) = freebusy();

        let response = freebusy
            .handle(Some("2024-03-01T00:00:00Z"), Some("2024-03-08T00:00:00Z"))
            .await
            .unwrap();

        assert_eq!(
            response.busy,
            vec![
                BusyInterval::new(
                    Utc.with_ymd_and_hms(2024, 3, 7, 15, 0, 0).unwrap(),
                    Utc.with_ymd_and_hms(2024, 3, 7, 16, 0, 0).unwrap(),
                ),
                BusyInterval::new(
                    Utc.with_ymd_and_hms(2024, 3, 3, 10, 0, 0).unwrap(),
                    Utc.with_ymd_and_hms(2024, 3, 3, 11, 0, 0).unwrap(),
                ),
            ]
        );
    }

    #[tokio::test]
    async fn missing_bound_fails_without_fetching() {
        let (fetcher, freebusy) = freebusy();

        let missing_end = freebusy.handle(Some("2024-03-01T00:00:00Z"), None).await;
        let empty_start = freebusy.handle(Some(""), Some("2024-03-08T00:00:00Z")).await;

        assert_eq!(missing_end, Err(FreeBusyError::MissingWindow));
        assert_eq!(empty_start, Err(FreeBusyError::MissingWindow));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn unparseable_bound_fails_without_fetching() {
        let (fetcher, freebusy) = freebusy();

        let result = freebusy.handle(Some("yesterday"), Some("2024-03-08")).await;

        assert_eq!(result, Err(FreeBusyError::InvalidTimestamp("yesterday".to_string())));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn reversed_window_is_empty_not_an_error() {
        let (_, freebusy) = freebusy();

        let response = freebusy
            .handle(Some("2024-03-08T00:00:00Z"), Some("2024-03-01T00:00:00Z"))
            .await
            .unwrap();

        assert!(response.busy.is_empty());
    }

    #[tokio::test]
    async fn upstream_failure_propagates() {
        let (fetcher, freebusy) = freebusy();
        fetcher.set_failing(true);

        let result = freebusy
            .handle(Some("2024-03-01T00:00:00Z"), Some("2024-03-08T00:00:00Z"))
            .await;

        assert!(matches!(result, Err(FreeBusyError::Fetch(_))));
    }
}
