//! Events produced by a model provider stream.
//!
//! A single model invocation yields an ordered sequence of [`ModelEvent`]s
//! terminated by [`ModelEvent::Done`]. Tool requests arrive fully
//! assembled; providers are responsible for buffering partial tool-input
//! deltas from their own wire format.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Why the model stopped generating.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model finished its answer.
    EndTurn,
    /// The model is waiting for tool outcomes.
    ToolUse,
    /// Output-token ceiling reached.
    MaxTokens,
}

/// Token usage reported for a single model invocation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    /// Input tokens consumed.
    pub input_tokens: u64,
    /// Output tokens produced.
    pub output_tokens: u64,
}

/// A single event from a model invocation stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelEvent {
    /// Incremental text.
    TextDelta {
        /// Text fragment.
        text: String,
    },

    /// A fully assembled tool request.
    ToolRequested {
        /// Request ID, unique within the session.
        id: String,
        /// Tool name.
        name: String,
        /// Tool input.
        input: Map<String, Value>,
        /// Whether the provider fulfils this request itself. Server tool
        /// outcomes arrive later in the same stream; the runtime must not
        /// dispatch these locally.
        server_tool: bool,
    },

    /// Outcome of a server-fulfilled tool, delivered inside the same turn.
    ServerToolOutcome {
        /// ID of the tool request this outcome answers.
        request_id: String,
        /// Outcome payload.
        content: Value,
        /// Whether fulfilment failed.
        is_error: bool,
    },

    /// Terminal event for the invocation.
    Done {
        /// Why generation stopped.
        stop_reason: StopReason,
        /// Token usage for this invocation.
        usage: TokenUsage,
    },
}

impl ModelEvent {
    /// Whether this event terminates the invocation stream.
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stop_reason_serde() {
        assert_eq!(
            serde_json::to_string(&StopReason::ToolUse).unwrap(),
            "\"tool_use\""
        );
        assert_eq!(
            serde_json::to_string(&StopReason::EndTurn).unwrap(),
            "\"end_turn\""
        );
    }

    #[test]
    fn done_is_terminal() {
        let done = ModelEvent::Done {
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        };
        assert!(done.is_done());
        assert!(!ModelEvent::TextDelta { text: "x".into() }.is_done());
    }

    #[test]
    fn tool_requested_roundtrip() {
        let mut input = Map::new();
        let _ = input.insert("table".into(), json!("shoppers"));
        let event = ModelEvent::ToolRequested {
            id: "req-1".into(),
            name: "discover_schema".into(),
            input,
            server_tool: false,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: ModelEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn usage_is_copy_and_defaults_to_zero() {
        let usage = TokenUsage::default();
        assert_eq!(usage.input_tokens, 0);
        assert_eq!(usage.output_tokens, 0);
    }
}
