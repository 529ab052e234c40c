pub mod freebusy;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use freebusy_core::FreeBusyError;
use freebusy_core::protocol::error_response;

/// Convert pipeline errors to HTTP responses
pub struct AppError(FreeBusyError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = error_response(&self.0);
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(body)).into_response()
    }
}

impl From<FreeBusyError> for AppError {
    fn from(err: FreeBusyError) -> Self {
        Self(err)
    }
}
