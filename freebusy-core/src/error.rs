//! Error types for the freebusy pipeline.

use thiserror::Error;

/// Errors that can occur while answering a free/busy query.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FreeBusyError {
    #[error("start and end query params required (ISO strings)")]
    MissingWindow,

    #[error("invalid timestamp '{0}' (expected ISO 8601)")]
    InvalidTimestamp(String),

    #[error("ICS parse error: {0}")]
    IcsParse(String),

    #[error("Invalid RRULE: {0}")]
    InvalidRule(String),

    #[error("{0}")]
    Fetch(String),
}

impl FreeBusyError {
    /// Whether the error was caused by the caller's query rather than by the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            FreeBusyError::MissingWindow | FreeBusyError::InvalidTimestamp(_)
        )
    }
}

/// Result type alias for freebusy operations.
pub type FreeBusyResult<T> = Result<T, FreeBusyError>;
