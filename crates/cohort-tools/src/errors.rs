//! Tool error types.
//!
//! Unified error enum for all tool execution failures. These errors never
//! abort the session; the runtime routes them through the diagnostic
//! classifier and feeds the result back to the model.

use std::io;

use thiserror::Error;

/// Errors that can occur during tool execution.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Parameter validation failed.
    #[error("validation error: {message}")]
    Validation {
        /// Description of the validation failure.
        message: String,
    },

    /// A memory path resolved outside the tenant's root.
    #[error("path escapes the memory root: {path}")]
    PathEscape {
        /// The offending path.
        path: String,
    },

    /// Memory file not found.
    #[error("file not found: {path}")]
    FileNotFound {
        /// The path that was not found.
        path: String,
    },

    /// A memory write would exceed a size ceiling.
    #[error("size limit exceeded: {message}")]
    SizeLimit {
        /// Which ceiling and by how much.
        message: String,
    },

    /// Query execution failed.
    #[error("query error: {message}")]
    Query {
        /// Raw failure message from the data source.
        message: String,
    },

    /// Data source connection failed.
    #[error("connection error: {message}")]
    Connection {
        /// Description of the connection failure.
        message: String,
    },

    /// Generic I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Operation timed out.
    #[error("timeout after {timeout_ms}ms")]
    Timeout {
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// Operation was cancelled.
    #[error("cancelled")]
    Cancelled,

    /// Tool not found in registry.
    #[error("tool not found: {name}")]
    ToolNotFound {
        /// The tool name that was not found.
        name: String,
    },

    /// Internal error (catch-all).
    #[error("{message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}
