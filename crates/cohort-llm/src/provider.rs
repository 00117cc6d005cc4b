//! # Provider Trait
//!
//! Core abstraction for model backends. The orchestrator never talks to a
//! model service directly; it builds a [`ModelRequest`] and consumes the
//! boxed [`Stream`] of [`ModelEvent`]s a [`ModelProvider`] returns,
//! processing tokens incrementally regardless of the underlying API format.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use cohort_core::messages::Message;
use cohort_core::tools::ToolDefinition;

use crate::events::ModelEvent;

/// Result type alias for provider operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Boxed stream of [`ModelEvent`]s returned by [`ModelProvider::stream`].
pub type ModelEventStream = Pin<Box<dyn Stream<Item = Result<ModelEvent, ModelError>> + Send>>;

/// Errors that can occur during provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Authentication failed (expired token, invalid key, etc.).
    #[error("Auth error: {message}")]
    Auth {
        /// Error description.
        message: String,
    },

    /// Rate limited by the model service.
    #[error("Rate limited: retry after {retry_after_ms}ms")]
    RateLimited {
        /// Suggested retry delay in milliseconds.
        retry_after_ms: u64,
        /// Error description.
        message: String,
    },

    /// Model service returned an API error.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
        /// Service-specific error code.
        code: Option<String>,
        /// Whether this error can be retried.
        retryable: bool,
    },

    /// The event stream ended before a terminal event.
    #[error("Stream interrupted: {message}")]
    StreamInterrupted {
        /// Error description.
        message: String,
    },

    /// Stream was cancelled.
    #[error("Stream cancelled")]
    Cancelled,

    /// Provider-specific error.
    #[error("{message}")]
    Other {
        /// Error description.
        message: String,
    },
}

impl ModelError {
    /// Whether this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::StreamInterrupted { .. } => true,
            Self::Api { retryable, .. } => *retryable,
            Self::Json(_) | Self::Auth { .. } | Self::Cancelled | Self::Other { .. } => false,
        }
    }

    /// Extract retry-after delay in milliseconds, if available.
    #[must_use]
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_ms, .. } => Some(*retry_after_ms),
            _ => None,
        }
    }

    /// Error category string for event emission.
    #[must_use]
    pub fn category(&self) -> &str {
        match self {
            Self::Json(_) => "parse",
            Self::Auth { .. } => "auth",
            Self::RateLimited { .. } => "rate_limit",
            Self::Api { .. } => "api",
            Self::StreamInterrupted { .. } => "stream",
            Self::Cancelled => "cancelled",
            Self::Other { .. } => "unknown",
        }
    }
}

/// A single model invocation request.
///
/// Carries the (possibly pruned) message history, the tool declarations
/// for this turn, and the system instruction. History pruning happens
/// before the request is built; providers send exactly what they are given.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRequest {
    /// System instruction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Ordered message history to send.
    pub messages: Vec<Message>,
    /// Tool declarations advertised for this invocation.
    pub tools: Vec<ToolDefinition>,
}

impl ModelRequest {
    /// Build a request from a message history and tool declarations.
    #[must_use]
    pub fn new(messages: Vec<Message>, tools: Vec<ToolDefinition>) -> Self {
        Self {
            system: None,
            messages,
            tools,
        }
    }

    /// Attach a system instruction.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Options for a model stream request.
///
/// All fields are optional; providers use sensible defaults when not specified.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStreamOptions {
    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature (0.0 - 2.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Stop sequences.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

/// Core model provider trait.
///
/// Implementors must be `Send + Sync` for use across async tasks. The
/// [`stream`](ModelProvider::stream) method returns an async stream of
/// [`ModelEvent`]s that the runtime consumes until
/// [`ModelEvent::Done`](crate::events::ModelEvent::Done) or an error.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Current model ID (e.g. `"claude-sonnet-4-5"`).
    fn model(&self) -> &str;

    /// Stream a response from the model.
    async fn stream(
        &self,
        request: &ModelRequest,
        options: &ModelStreamOptions,
    ) -> ModelResult<ModelEventStream>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{StopReason, TokenUsage};
    use cohort_core::messages::Message;
    use futures::StreamExt;

    #[test]
    fn rate_limited_is_retryable() {
        let err = ModelError::RateLimited {
            retry_after_ms: 5000,
            message: "Too many requests".into(),
        };
        assert!(err.is_retryable());
        assert_eq!(err.retry_after_ms(), Some(5000));
        assert_eq!(err.category(), "rate_limit");
    }

    #[test]
    fn api_error_honors_retryable_flag() {
        let retryable = ModelError::Api {
            status: 529,
            message: "Overloaded".into(),
            code: None,
            retryable: true,
        };
        assert!(retryable.is_retryable());

        let fatal = ModelError::Api {
            status: 400,
            message: "Bad request".into(),
            code: Some("invalid_request".into()),
            retryable: false,
        };
        assert!(!fatal.is_retryable());
        assert_eq!(fatal.category(), "api");
    }

    #[test]
    fn auth_not_retryable() {
        let err = ModelError::Auth {
            message: "Token expired".into(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.category(), "auth");
        assert_eq!(err.retry_after_ms(), None);
    }

    #[test]
    fn cancelled_not_retryable() {
        let err = ModelError::Cancelled;
        assert!(!err.is_retryable());
        assert_eq!(err.category(), "cancelled");
    }

    #[test]
    fn stream_interrupted_is_retryable() {
        let err = ModelError::StreamInterrupted {
            message: "connection reset".into(),
        };
        assert!(err.is_retryable());
        assert_eq!(err.category(), "stream");
    }

    #[test]
    fn error_display() {
        let err = ModelError::Api {
            status: 429,
            message: "Rate limited".into(),
            code: None,
            retryable: true,
        };
        assert_eq!(err.to_string(), "API error (429): Rate limited");
    }

    #[test]
    fn request_builder() {
        let request = ModelRequest::new(vec![Message::user_text("hi")], Vec::new())
            .with_system("You build audiences.");
        assert_eq!(request.system.as_deref(), Some("You build audiences."));
        assert_eq!(request.messages.len(), 1);
    }

    #[test]
    fn stream_options_skip_none_fields() {
        let opts = ModelStreamOptions {
            max_tokens: Some(1000),
            ..Default::default()
        };
        let json = serde_json::to_value(&opts).unwrap();
        assert!(json.get("maxTokens").is_some());
        assert!(json.get("temperature").is_none());
        assert!(json.get("stopSequences").is_none());
    }

    #[test]
    fn provider_is_object_safe_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn ModelProvider>();
    }

    struct FakeProvider;

    #[async_trait]
    impl ModelProvider for FakeProvider {
        fn model(&self) -> &str {
            "fake-model"
        }

        async fn stream(
            &self,
            _request: &ModelRequest,
            _options: &ModelStreamOptions,
        ) -> ModelResult<ModelEventStream> {
            Ok(Box::pin(async_stream::stream! {
                yield Ok(ModelEvent::TextDelta { text: "hello".into() });
                yield Ok(ModelEvent::Done {
                    stop_reason: StopReason::EndTurn,
                    usage: TokenUsage { input_tokens: 10, output_tokens: 2 },
                });
            }))
        }
    }

    #[tokio::test]
    async fn fake_provider_stream_terminates_with_done() {
        let provider = FakeProvider;
        let request = ModelRequest::new(vec![Message::user_text("hi")], Vec::new());
        let mut stream = provider
            .stream(&request, &ModelStreamOptions::default())
            .await
            .unwrap();

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first, ModelEvent::TextDelta { text: "hello".into() });
        let second = stream.next().await.unwrap().unwrap();
        assert!(second.is_done());
        assert!(stream.next().await.is_none());
    }
}
