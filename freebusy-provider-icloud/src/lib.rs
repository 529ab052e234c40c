//! iCloud calendar fetcher for freebusy.
//!
//! Discovery flow over CalDAV, using libdav:
//! 1. current-user-principal on the CalDAV endpoint
//! 2. calendar-home-set of that principal
//! 3. PROPFIND on the home set for calendar collections and display names
//! 4. calendar-data of every resource in every collection

pub mod caldav;

use anyhow::{Context, Result};
use freebusy_core::{CalendarFetcher, FreeBusyError, FreeBusyResult, Payload, RawCalendar, RawObject};
use libdav::caldav::{FindCalendarHomeSet, GetCalendarResources};
use tracing::debug;

use crate::caldav::{ListCalendarCollections, absolute_url, create_caldav_client, url_to_href};

/// iCloud's public CalDAV endpoint.
pub const CALDAV_ENDPOINT: &str = "https://caldav.icloud.com/";

/// Apple ID plus app-specific password.
#[derive(Clone)]
pub struct Credentials {
    pub apple_id: String,
    pub app_password: String,
}

impl Credentials {
    pub fn new(apple_id: impl Into<String>, app_password: impl Into<String>) -> Self {
        Credentials {
            apple_id: apple_id.into(),
            app_password: app_password.into(),
        }
    }

    /// Get credentials as (username, password) tuple for HTTP basic auth
    pub fn basic_auth(&self) -> (&str, &str) {
        (&self.apple_id, &self.app_password)
    }
}

// Keep the password out of logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("apple_id", &self.apple_id)
            .field("app_password", &"***")
            .finish()
    }
}

/// Fetches every calendar of one account from a CalDAV server.
#[derive(Debug, Clone)]
pub struct ICloudFetcher {
    server_url: String,
    credentials: Credentials,
}

impl ICloudFetcher {
    pub fn new(credentials: Credentials) -> Self {
        Self::with_server(CALDAV_ENDPOINT, credentials)
    }

    /// Use another CalDAV server with the same discovery flow.
    pub fn with_server(server_url: impl Into<String>, credentials: Credentials) -> Self {
        ICloudFetcher {
            server_url: server_url.into(),
            credentials,
        }
    }

    async fn fetch(&self) -> Result<Vec<RawCalendar>> {
        let (username, password) = self.credentials.basic_auth();
        let caldav = create_caldav_client(&self.server_url, username, password)?;

        let principal = caldav
            .find_current_user_principal()
            .await
            .context("Failed to find current user principal")?
            .ok_or_else(|| {
                anyhow::anyhow!("CalDAV authentication failed. Check your account ID and app password.")
            })?;

        let home_set_response = caldav
            .request(FindCalendarHomeSet::new(&principal))
            .await
            .context("Failed to find calendar home set")?;

        let calendar_home = home_set_response
            .home_sets
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No calendar home set found for this account"))?;

        // The home set may live on a user-specific host
        let home_url = absolute_url(caldav.base_url(), &calendar_home);
        let home_client = create_caldav_client(&home_url, username, password)?;
        let home_href = url_to_href(&home_url);

        let collections = home_client
            .request(ListCalendarCollections::new(&home_href))
            .await
            .context("Failed to list calendars")?
            .collections;

        let mut calendars = Vec::with_capacity(collections.len());
        for collection in collections {
            let response = home_client
                .request(GetCalendarResources::new(&collection.href))
                .await
                .with_context(|| format!("Failed to fetch calendar resources of {}", collection.href))?;

            // Resources answered with an error status carry no payload
            let objects: Vec<RawObject> = response
                .resources
                .into_iter()
                .map(|resource| RawObject {
                    href: resource.href,
                    payload: resource.content.ok().map(|content| Payload::Text(content.data)),
                })
                .collect();

            debug!(
                calendar = collection.display_name.as_deref().unwrap_or(&collection.href),
                objects = objects.len(),
                "fetched calendar"
            );

            calendars.push(RawCalendar {
                display_name: collection.display_name,
                objects,
            });
        }

        Ok(calendars)
    }
}

impl CalendarFetcher for ICloudFetcher {
    async fn fetch_calendars(&self) -> FreeBusyResult<Vec<RawCalendar>> {
        self.fetch()
            .await
            .map_err(|e| FreeBusyError::Fetch(format!("{:#}", e)))
    }
}
