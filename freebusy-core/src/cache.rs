//! Time-based cache of extracted event records.
//!
//! The cache owns its fetcher. A lookup refreshes when the snapshot is older
//! than the TTL (or was never filled). The async mutex covers the whole
//! check-refresh-replace sequence, so concurrent stale lookups share one
//! upstream fetch and never observe a half-written snapshot.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::FreeBusyResult;
use crate::event::EventRecord;
use crate::extract::extract_events;
use crate::fetcher::CalendarFetcher;

/// Maximum age of cached events.
pub const CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// The last successful extraction.
#[derive(Debug)]
struct Snapshot {
    entries: Arc<[EventRecord]>,
    fetched_at: Option<Instant>,
}

impl Snapshot {
    fn empty() -> Self {
        Snapshot {
            entries: Arc::from(Vec::<EventRecord>::new()),
            fetched_at: None,
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at
            .is_some_and(|fetched_at| fetched_at.elapsed() < ttl)
    }
}

pub struct EventCache<F> {
    fetcher: F,
    ttl: Duration,
    snapshot: Mutex<Snapshot>,
}

impl<F: CalendarFetcher> EventCache<F> {
    pub fn new(fetcher: F) -> Self {
        Self::with_ttl(fetcher, CACHE_TTL)
    }

    pub fn with_ttl(fetcher: F, ttl: Duration) -> Self {
        EventCache {
            fetcher,
            ttl,
            snapshot: Mutex::new(Snapshot::empty()),
        }
    }

    /// Current event records, refreshed from upstream when stale.
    ///
    /// A failed refresh returns the error and leaves the previous snapshot,
    /// including its fetch time, untouched; the next call retries.
    pub async fn events(&self) -> FreeBusyResult<Arc<[EventRecord]>> {
        let mut snapshot = self.snapshot.lock().await;

        if snapshot.is_fresh(self.ttl) {
            debug!(events = snapshot.entries.len(), "serving cached events");
            return Ok(Arc::clone(&snapshot.entries));
        }

        let calendars = self.fetcher.fetch_calendars().await?;
        let extraction = extract_events(&calendars);

        for failure in &extraction.failures {
            warn!(
                href = %failure.href,
                calendar = %failure.calendar_name,
                error = %failure.error,
                "skipping unparseable calendar object"
            );
        }
        info!(
            calendars = calendars.len(),
            events = extraction.events.len(),
            failures = extraction.failures.len(),
            "refreshed event cache"
        );

        *snapshot = Snapshot {
            entries: Arc::from(extraction.events),
            fetched_at: Some(Instant::now()),
        };

        Ok(Arc::clone(&snapshot.entries))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::FreeBusyError;
    use crate::fetcher::{Payload, RawCalendar, RawObject};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    pub(crate) const WEEKLY_ICS: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:TEST\r\n\
BEGIN:VEVENT\r\n\
UID:weekly-sync\r\n\
SUMMARY:Team sync\r\n\
DTSTART:20240201T150000Z\r\n\
DTEND:20240201T160000Z\r\n\
RRULE:FREQ=WEEKLY\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    pub(crate) const ONE_OFF_ICS: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:TEST\r\n\
BEGIN:VEVENT\r\n\
UID:dentist\r\n\
SUMMARY:Dentist\r\n\
DTSTART:20240303T100000Z\r\n\
DTEND:20240303T110000Z\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    /// Fetcher serving a fixed account, counting calls; fails while `failing` is set.
    #[derive(Default)]
    pub(crate) struct FakeFetcher {
        pub calls: AtomicUsize,
        pub failing: AtomicBool,
    }

    impl FakeFetcher {
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    impl CalendarFetcher for Arc<FakeFetcher> {
        async fn fetch_calendars(&self) -> FreeBusyResult<Vec<RawCalendar>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(FreeBusyError::Fetch("401 Unauthorized".to_string()));
            }
            Ok(vec![RawCalendar {
                display_name: Some("Work".to_string()),
                objects: vec![
                    RawObject {
                        href: "/work/weekly.ics".to_string(),
                        payload: Some(Payload::Text(WEEKLY_ICS.to_string())),
                    },
                    RawObject {
                        href: "/work/dentist.ics".to_string(),
                        payload: Some(Payload::Text(ONE_OFF_ICS.to_string())),
                    },
                ],
            }])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fetches_once_within_ttl() {
        let fetcher = Arc::new(FakeFetcher::default());
        let cache = EventCache::new(Arc::clone(&fetcher));

        let first = cache.events().await.unwrap();
        tokio::time::advance(Duration::from_secs(60)).await;
        let second = cache.events().await.unwrap();

        assert_eq!(fetcher.calls(), 1);
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn refetches_exactly_once_after_ttl() {
        let fetcher = Arc::new(FakeFetcher::default());
        let cache = EventCache::new(Arc::clone(&fetcher));

        cache.events().await.unwrap();
        tokio::time::advance(CACHE_TTL).await;
        cache.events().await.unwrap();
        cache.events().await.unwrap();

        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_propagates_and_retries_next_time() {
        let fetcher = Arc::new(FakeFetcher::default());
        let cache = EventCache::new(Arc::clone(&fetcher));

        cache.events().await.unwrap();
        tokio::time::advance(CACHE_TTL + Duration::from_secs(1)).await;

        fetcher.set_failing(true);
        let err = cache.events().await.unwrap_err();
        assert_eq!(err, FreeBusyError::Fetch("401 Unauthorized".to_string()));

        // Stale data is not served, and the fetch time was not bumped
        assert!(cache.events().await.is_err());
        assert_eq!(fetcher.calls(), 3);

        fetcher.set_failing(false);
        assert_eq!(cache.events().await.unwrap().len(), 2);
        assert_eq!(fetcher.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_stale_lookups_share_one_fetch() {
        let fetcher = Arc::new(FakeFetcher::default());
        let cache = Arc::new(EventCache::new(Arc::clone(&fetcher)));

        let lookups: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.events().await.map(|e| e.len()) })
            })
            .collect();

        for lookup in lookups {
            assert_eq!(lookup.await.unwrap().unwrap(), 2);
        }
        assert_eq!(fetcher.calls(), 1);
    }
}
