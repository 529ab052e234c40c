//! Request and response shapes shared by the deployment adapters.
//!
//! The HTTP server maps these onto axum types; the one-shot handler speaks
//! them as JSON lines over stdin/stdout.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::FreeBusyError;
use crate::fetcher::CalendarFetcher;
use crate::freebusy::FreeBusy;

pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_METHOD_NOT_ALLOWED: u16 = 405;
pub const STATUS_INTERNAL_ERROR: u16 = 500;

/// Error payload: `{ "error": ..., "detail"?: ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        ErrorBody {
            error: error.into(),
            detail: None,
        }
    }

    pub fn method_not_allowed() -> Self {
        ErrorBody::new("Method not allowed")
    }
}

/// Status code and body for a failed query.
///
/// Caller mistakes are 400 with the error message; everything else is a 500
/// carrying the underlying message as `detail`.
pub fn error_response(err: &FreeBusyError) -> (u16, ErrorBody) {
    if err.is_client_error() {
        debug!(error = %err, "rejected free/busy query");
        return (STATUS_BAD_REQUEST, ErrorBody::new(err.to_string()));
    }

    error!(error = %err, "free/busy query failed");
    (
        STATUS_INTERNAL_ERROR,
        ErrorBody {
            error: "failed to fetch events".to_string(),
            detail: Some(err.to_string()),
        },
    )
}

/// One invocation of the one-shot handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub query: HashMap<String, String>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// Reply of the one-shot handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub body: serde_json::Value,
}

impl Response {
    fn new(status: u16, body: impl Serialize) -> Self {
        // Serializing plain structs of strings cannot fail
        let body = serde_json::to_value(body).unwrap_or(serde_json::Value::Null);
        Response { status, body }
    }

    pub fn error(status: u16, body: ErrorBody) -> Self {
        Response::new(status, body)
    }
}

/// Run one request through the pipeline.
pub async fn handle_request<F: CalendarFetcher>(freebusy: &FreeBusy<F>, request: &Request) -> Response {
    if !request.method.eq_ignore_ascii_case("GET") {
        return Response::error(STATUS_METHOD_NOT_ALLOWED, ErrorBody::method_not_allowed());
    }

    let start = request.query.get("start").map(String::as_str);
    let end = request.query.get("end").map(String::as_str);

    match freebusy.handle(start, end).await {
        Ok(busy) => Response::new(STATUS_OK, busy),
        Err(err) => {
            let (status, body) = error_response(&err);
            Response::error(status, body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EventCache;
    use crate::cache::tests::FakeFetcher;
    use std::sync::Arc;

    fn request(method: &str, query: &[(&str, &str)]) -> Request {
        Request {
            method: method.to_string(),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn freebusy() -> (Arc<FakeFetcher>, FreeBusy<Arc<FakeFetcher>>) {
        let fetcher = Arc::new(FakeFetcher::default());
        let freebusy = FreeBusy::new(EventCache::new(Arc::clone(&fetcher)));
        (fetcher, freebusy)
    }

    #[tokio::test]
    async fn non_get_is_method_not_allowed() {
        let (fetcher, freebusy) = freebusy();

        let response = handle_request(&freebusy, &request("POST", &[])).await;

        assert_eq!(response.status, 405);
        assert_eq!(response.body, serde_json::json!({ "error": "Method not allowed" }));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn missing_end_is_bad_request() {
        let (fetcher, freebusy) = freebusy();

        let response =
            handle_request(&freebusy, &request("GET", &[("start", "2024-03-01T00:00:00Z")])).await;

        assert_eq!(response.status, 400);
        assert_eq!(
            response.body,
            serde_json::json!({ "error": "start and end query params required (ISO strings)" })
        );
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn upstream_failure_is_500_with_detail() {
        let (fetcher, freebusy) = freebusy();
        fetcher.set_failing(true);

        let response = handle_request(
            &freebusy,
            &request(
                "GET",
                &[("start", "2024-03-01T00:00:00Z"), ("end", "2024-03-08T00:00:00Z")],
            ),
        )
        .await;

        assert_eq!(response.status, 500);
        assert_eq!(
            response.body,
            serde_json::json!({ "error": "failed to fetch events", "detail": "401 Unauthorized" })
        );
    }

    #[tokio::test]
    async fn success_body_lists_busy_intervals() {
        let (_, freebusy) = freebusy();

        let response = handle_request(
            &freebusy,
            &request(
                "get",
                &[("start", "2024-03-03T00:00:00Z"), ("end", "2024-03-04T00:00:00Z")],
            ),
        )
        .await;

        assert_eq!(response.status, 200);
        assert_eq!(
            response.body,
            serde_json::json!({
                "busy": [
                    { "start": "2024-03-03T10:00:00.000Z", "end": "2024-03-03T11:00:00.000Z", "title": "Busy" }
                ]
            })
        );
    }

    #[test]
    fn request_defaults_to_get_with_empty_query() {
        let request: Request = serde_json::from_str("{}").unwrap();
        assert_eq!(request.method, "GET");
        assert!(request.query.is_empty());
    }
}
