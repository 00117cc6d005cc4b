//! Error types for the transcript store.

use thiserror::Error;

/// Errors that can occur during transcript store operations.
#[derive(Debug, Error)]
pub enum TranscriptError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// JSON serialization/deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// Requested session was not found.
    #[error("session not found: {0}")]
    SessionNotFound(String),
}

/// Convenience type alias for transcript store results.
pub type Result<T> = std::result::Result<T, TranscriptError>;
