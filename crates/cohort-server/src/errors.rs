//! API error mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use cohort_runtime::RuntimeError;
use cohort_transcripts::errors::TranscriptError;

/// Errors surfaced to HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Tenant resolution failed. Always fails closed.
    #[error("unauthorized")]
    Unauthorized,

    /// The inbound request is malformed.
    #[error("validation error: {0}")]
    Validation(String),

    /// A referenced resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A turn is already running for the session.
    #[error("session busy: {0}")]
    Busy(String),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Busy(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<RuntimeError> for ApiError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::SessionBusy(id) => Self::Busy(id),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<TranscriptError> for ApiError {
    fn from(err: TranscriptError) -> Self {
        match err {
            TranscriptError::SessionNotFound(id) => Self::NotFound(id),
            other => Self::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::Validation("query is required".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Busy("sess-1".into()).status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn runtime_busy_maps_to_conflict() {
        let err = ApiError::from(RuntimeError::SessionBusy("sess-1".into()));
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn unknown_session_maps_to_not_found() {
        let err = ApiError::from(TranscriptError::SessionNotFound("sess-1".into()));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
