//! Error types and the client-facing error body.

use serde::Serialize;
use thiserror::Error;

/// Stable machine-readable error codes for the query surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Unknown search mode.
    InvalidMode,
    /// `since` lacked timezone information or was unparseable.
    InvalidTimezone,
    /// Query validation or internal search failure.
    SearchError,
    /// Referenced item does not exist.
    NotFound,
}

impl ErrorCode {
    /// Wire representation of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidMode => "INVALID_MODE",
            Self::InvalidTimezone => "INVALID_TIMEZONE",
            Self::SearchError => "SEARCH_ERROR",
            Self::NotFound => "NOT_FOUND",
        }
    }
}

/// Errors from the retrieval engine.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Mode string was not `literal`, `semantic`, or `hybrid`.
    #[error("invalid mode: {0}. Must be 'literal', 'semantic', or 'hybrid'")]
    InvalidMode(String),

    /// Query length outside 1..=512 chars.
    #[error("query must be between 1 and 512 characters")]
    InvalidQuery,

    /// `since` must carry an offset (e.g. `2025-01-01T00:00:00Z`).
    #[error("since must be ISO-8601 with timezone information: {0}")]
    InvalidTimezone(String),

    /// Store or embedding failure during scoring.
    #[error("search failed: {0}")]
    Store(#[from] lorekeep_world::WorldError),
}

impl SearchError {
    /// Maps the error onto its wire code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidMode(_) => ErrorCode::InvalidMode,
            Self::InvalidTimezone(_) => ErrorCode::InvalidTimezone,
            Self::InvalidQuery | Self::Store(_) => ErrorCode::SearchError,
        }
    }

    /// Builds the client-facing body with a correlation id.
    #[must_use]
    pub fn to_body(&self, request_id: impl Into<String>) -> ErrorBody {
        ErrorBody {
            request_id: request_id.into(),
            message: self.to_string(),
            code: self.code(),
        }
    }
}

/// Client-facing error shape `{request_id, message, code}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Correlation id for log lookup.
    pub request_id: String,
    /// Human-readable message.
    pub message: String,
    /// Machine-readable code.
    pub code: ErrorCode,
}
