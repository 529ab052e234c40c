use std::sync::Arc;

use freebusy_core::{CalendarFetcher, EventCache, FreeBusy};
use freebusy_provider_icloud::{Credentials, ICloudFetcher};

use crate::config::Config;

/// Shared application state
pub struct AppState<F> {
    freebusy: Arc<FreeBusy<F>>,
}

// Derived Clone would require F: Clone
impl<F> Clone for AppState<F> {
    fn clone(&self) -> Self {
        AppState {
            freebusy: Arc::clone(&self.freebusy),
        }
    }
}

impl<F: CalendarFetcher> AppState<F> {
    pub fn new(fetcher: F) -> Self {
        AppState {
            freebusy: Arc::new(FreeBusy::new(EventCache::new(fetcher))),
        }
    }

    pub fn freebusy(&self) -> &FreeBusy<F> {
        &self.freebusy
    }
}

impl AppState<ICloudFetcher> {
    pub fn from_config(config: &Config) -> Self {
        let credentials = Credentials::new(&config.icloud_id, &config.icloud_app_password);
        AppState::new(ICloudFetcher::new(credentials))
    }
}
