//! Runtime error types.

use thiserror::Error;

/// Errors that can occur while driving a conversation.
///
/// Tool execution failures are deliberately absent: they never surface as
/// runtime errors. The dispatcher classifies them and recycles the
/// diagnostic into the conversation instead.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Model invocation failed. Fatal to the session.
    #[error("model error: {0}")]
    Model(#[from] cohort_llm::provider::ModelError),

    /// Another turn is already running for this session.
    #[error("session busy: {0}")]
    SessionBusy(String),

    /// Internal / unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RuntimeError {
    /// Whether the caller can meaningfully retry.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Model(e) => e.is_retryable(),
            Self::SessionBusy(_) => true,
            Self::Internal(_) => false,
        }
    }

    /// Error category string for logging.
    #[must_use]
    pub fn category(&self) -> &str {
        match self {
            Self::Model(_) => "model",
            Self::SessionBusy(_) => "session_busy",
            Self::Internal(_) => "internal",
        }
    }
}

/// Convenience type alias for runtime results.
pub type Result<T> = std::result::Result<T, RuntimeError>;
