//! CalDAV client helpers using libdav.
//!
//! Provides client construction with basic auth and redirect following, plus a
//! PROPFIND request that lists the calendar collections of a home set along
//! with their display names.

use anyhow::{Context, Result};
use http::{Method, Uri};
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::{client::legacy::Client, rt::TokioExecutor};
use libdav::CalDavClient;
use libdav::dav::WebDavClient;
use libdav::requests::{DavRequest, ParseResponseError, PreparedRequest};
use tower::ServiceBuilder;
use tower_http::{auth::AddAuthorization, follow_redirect::FollowRedirect};

/// Type alias for the HTTP client with auth and redirect following.
type HttpClient = FollowRedirect<AddAuthorization<Client<hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>, String>>>;

/// Type alias for our CalDAV client.
pub type ICloudCalDavClient = CalDavClient<HttpClient>;

/// Create a libdav CalDavClient rooted at `base_url`.
///
/// The client is configured with:
/// - Basic authentication using the provided credentials
/// - Automatic redirect following (iCloud redirects to user-specific servers)
/// - HTTPS support
pub fn create_caldav_client(
    base_url: &str,
    username: &str,
    password: &str,
) -> Result<ICloudCalDavClient> {
    let uri: Uri = base_url
        .parse()
        .with_context(|| format!("Invalid base URL: {}", base_url))?;

    let https_connector = HttpsConnectorBuilder::new()
        .with_native_roots()
        .context("Failed to load native TLS roots")?
        .https_or_http()
        .enable_http1()
        .build();

    let http_client = Client::builder(TokioExecutor::new()).build(https_connector);

    let auth_client = AddAuthorization::basic(http_client, username, password);

    // iCloud answers on caldav.icloud.com with redirects to pXX-caldav.icloud.com
    let client = ServiceBuilder::new()
        .layer(tower_http::follow_redirect::FollowRedirectLayer::new())
        .service(auth_client);

    let webdav = WebDavClient::new(uri, client);
    Ok(CalDavClient::new(webdav))
}

/// Turn a possibly relative URI returned by the server into an absolute URL.
pub fn absolute_url(base: &Uri, uri: &Uri) -> String {
    if uri.authority().is_some() {
        return uri.to_string();
    }

    format!(
        "{}://{}{}",
        base.scheme_str().unwrap_or("https"),
        base.authority().map(|a| a.as_str()).unwrap_or("caldav.icloud.com"),
        uri.path()
    )
}

/// Extract the href path from a full URL.
///
/// Converts "https://pXX-caldav.icloud.com/123/calendars/abc/" to "/123/calendars/abc/"
pub fn url_to_href(url: &str) -> String {
    if let Ok(uri) = url.parse::<Uri>() {
        uri.path().to_string()
    } else {
        url.to_string()
    }
}

// ============================================================================
// Calendar collection listing
// ============================================================================

/// PROPFIND (Depth 1) on a calendar home set, returning its calendar collections.
pub struct ListCalendarCollections<'a> {
    home_href: &'a str,
}

impl<'a> ListCalendarCollections<'a> {
    pub fn new(home_href: &'a str) -> Self {
        Self { home_href }
    }
}

/// A calendar collection found under the home set.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarCollection {
    pub href: String,
    pub display_name: Option<String>,
}

/// Response from a [`ListCalendarCollections`] request.
#[derive(Debug)]
pub struct ListCalendarCollectionsResponse {
    pub collections: Vec<CalendarCollection>,
}

impl DavRequest for ListCalendarCollections<'_> {
    type Response = ListCalendarCollectionsResponse;
    type ParseError = ParseResponseError;
    type Error<E> = libdav::dav::WebDavError<E>;

    fn prepare_request(&self) -> std::result::Result<PreparedRequest, http::Error> {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<d:propfind xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:prop>
    <d:displayname/>
    <d:resourcetype/>
  </d:prop>
</d:propfind>"#;

        Ok(PreparedRequest {
            method: Method::from_bytes(b"PROPFIND")?,
            path: self.home_href.to_string(),
            body: body.to_string(),
            headers: vec![("Depth".to_string(), "1".to_string())],
        })
    }

    fn parse_response(
        &self,
        parts: &http::response::Parts,
        body: &[u8],
    ) -> std::result::Result<Self::Response, ParseResponseError> {
        if !parts.status.is_success() {
            return Err(ParseResponseError::BadStatusCode(parts.status));
        }

        let collections = parse_calendar_collections(body)?;
        Ok(ListCalendarCollectionsResponse { collections })
    }
}

/// Parse calendar collections from a PROPFIND multistatus response.
///
/// Only responses whose `resourcetype` contains a CalDAV `calendar` element are
/// kept; the home set itself and other collections (inbox, outbox, ...) are not.
fn parse_calendar_collections(
    body: &[u8],
) -> std::result::Result<Vec<CalendarCollection>, ParseResponseError> {
    let text = std::str::from_utf8(body)?;
    let doc = roxmltree::Document::parse(text)?;
    let root = doc.root_element();

    let mut collections = Vec::new();

    for response in root.descendants().filter(|n| n.tag_name().name() == "response") {
        let href = response
            .descendants()
            .find(|n| n.tag_name().name() == "href")
            .and_then(|n| n.text())
            .map(|s| s.trim().to_string());

        let Some(href) = href else { continue };

        let is_calendar = response
            .descendants()
            .filter(|n| n.tag_name().name() == "resourcetype")
            .flat_map(|n| n.children())
            .any(|n| n.tag_name().name() == "calendar");

        if !is_calendar {
            continue;
        }

        let display_name = response
            .descendants()
            .find(|n| n.tag_name().name() == "displayname")
            .and_then(|n| n.text())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        collections.push(CalendarCollection { href, display_name });
    }

    Ok(collections)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROPFIND_RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<multistatus xmlns="DAV:">
  <response>
    <href>/123/calendars/</href>
    <propstat>
      <prop>
        <resourcetype><collection/></resourcetype>
      </prop>
      <status>HTTP/1.1 200 OK</status>
    </propstat>
  </response>
  <response>
    <href>/123/calendars/home/</href>
    <propstat>
      <prop>
        <displayname>Home</displayname>
        <resourcetype><collection/><calendar xmlns="urn:ietf:params:xml:ns:caldav"/></resourcetype>
      </prop>
      <status>HTTP/1.1 200 OK</status>
    </propstat>
  </response>
  <response>
    <href>/123/calendars/inbox/</href>
    <propstat>
      <prop>
        <displayname>Inbox</displayname>
        <resourcetype><collection/><schedule-inbox xmlns="urn:ietf:params:xml:ns:caldav"/></resourcetype>
      </prop>
      <status>HTTP/1.1 200 OK</status>
    </propstat>
  </response>
  <response>
    <href>/123/calendars/unnamed/</href>
    <propstat>
      <prop>
        <displayname></displayname>
        <resourcetype><collection/><C:calendar xmlns:C="urn:ietf:params:xml:ns:caldav"/></resourcetype>
      </prop>
      <status>HTTP/1.1 200 OK</status>
    </propstat>
  </response>
</multistatus>"#;

    #[test]
    fn lists_only_calendar_collections() {
        let collections = parse_calendar_collections(PROPFIND_RESPONSE.as_bytes()).unwrap();

        assert_eq!(
            collections,
            vec![
                CalendarCollection {
                    href: "/123/calendars/home/".to_string(),
                    display_name: Some("Home".to_string()),
                },
                CalendarCollection {
                    href: "/123/calendars/unnamed/".to_string(),
                    display_name: None,
                },
            ]
        );
    }

    #[test]
    fn relative_uris_take_base_authority() {
        let base: Uri = "https://p42-caldav.icloud.com/".parse().unwrap();

        let relative: Uri = "/123/calendars/".parse().unwrap();
        assert_eq!(
            absolute_url(&base, &relative),
            "https://p42-caldav.icloud.com/123/calendars/"
        );

        let absolute: Uri = "https://p07-caldav.icloud.com/123/calendars/".parse().unwrap();
        assert_eq!(
            absolute_url(&base, &absolute),
            "https://p07-caldav.icloud.com/123/calendars/"
        );
    }

    #[test]
    fn url_to_href_keeps_path_only() {
        assert_eq!(
            url_to_href("https://p42-caldav.icloud.com/123/calendars/home/"),
            "/123/calendars/home/"
        );
    }
}
