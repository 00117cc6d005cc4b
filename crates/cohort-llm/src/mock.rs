//! Pre-programmed provider for deterministic runs without a model service.
//!
//! Used by tests and the development server: scripted responses are
//! consumed in sequence, and an optional canned turn answers every call
//! once (or instead of) the script.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::stream;

use crate::events::{ModelEvent, StopReason, TokenUsage};
use crate::provider::{
    ModelError, ModelEventStream, ModelProvider, ModelRequest, ModelResult, ModelStreamOptions,
};

/// A pre-programmed response for one `stream()` call.
pub enum MockResponse {
    /// Yield a sequence of events.
    Stream(Vec<ModelEvent>),
    /// Fail the `stream()` call itself.
    Error(ModelError),
}

impl MockResponse {
    /// A simple text turn ending with `Done`.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Stream(vec![
            ModelEvent::TextDelta { text: text.into() },
            ModelEvent::Done {
                stop_reason: StopReason::EndTurn,
                usage: TokenUsage::default(),
            },
        ])
    }
}

/// Provider that replays pre-programmed responses in sequence.
pub struct MockProvider {
    script: Mutex<VecDeque<MockResponse>>,
    canned: Option<String>,
    calls: AtomicUsize,
}

impl MockProvider {
    /// Consume the given responses one per call; error when exhausted.
    #[must_use]
    pub fn scripted(responses: Vec<MockResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            canned: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer every call with the same text turn.
    #[must_use]
    pub fn canned(text: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            canned: Some(text.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `stream()` calls made so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn model(&self) -> &str {
        "mock-model"
    }

    async fn stream(
        &self,
        _request: &ModelRequest,
        _options: &ModelStreamOptions,
    ) -> ModelResult<ModelEventStream> {
        let _ = self.calls.fetch_add(1, Ordering::SeqCst);

        let next = match self.script.lock() {
            Ok(mut script) => script.pop_front(),
            Err(_) => None,
        };
        let response = match (next, &self.canned) {
            (Some(response), _) => response,
            (None, Some(text)) => MockResponse::text(text.clone()),
            (None, None) => {
                return Err(ModelError::Other {
                    message: "mock provider script exhausted".into(),
                });
            }
        };

        match response {
            MockResponse::Stream(events) => {
                Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
            }
            MockResponse::Error(e) => Err(e),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
