//! Wire event protocol pushed to clients.
//!
//! A [`StreamEvent`] is a tagged JSON object emitted by the orchestrator
//! toward the single client of a session. Events are transient — the
//! transcript store persists the underlying messages, not these wire
//! frames. Clients rely on exact type strings and field names.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Coarse, heuristic label describing where in a turn's reasoning the
/// streamed text currently sits. Best-effort UX sugar — no correctness
/// logic may depend on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// The model is surveying schema/data.
    Exploring,
    /// The model is running and refining queries.
    Analyzing,
    /// The model is producing its final answer.
    Finalizing,
}

impl Phase {
    /// Advance monotonically — a phase never moves backward.
    #[must_use]
    pub fn advance_to(self, next: Self) -> Self {
        self.max(next)
    }

    /// Wire string for this phase.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exploring => "exploring",
            Self::Analyzing => "analyzing",
            Self::Finalizing => "finalizing",
        }
    }
}

/// An event pushed to the waiting client over the session's ordered channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// Incremental text from the model.
    #[serde(rename = "content_delta")]
    ContentDelta {
        /// Text fragment.
        content: String,
        /// Whether the running accumulation reads as exploratory planning.
        #[serde(rename = "isExploration")]
        is_exploration: bool,
        /// Whether the running accumulation reads as a final answer.
        #[serde(rename = "isFinalResult")]
        is_final_result: bool,
        /// Current coarse phase label.
        phase: Phase,
    },

    /// A tool request is being dispatched (or skipped, for server tools).
    #[serde(rename = "tool_use")]
    ToolStarted {
        /// Tool name.
        tool: String,
        /// Tool request ID.
        #[serde(rename = "toolId")]
        tool_id: String,
        /// Tool input.
        input: Map<String, Value>,
        /// Whether the model-service provider fulfils this tool itself.
        #[serde(rename = "isServerTool")]
        is_server_tool: bool,
    },

    /// A locally-dispatched tool finished and its outcome was appended.
    #[serde(rename = "tool_result")]
    ToolFinished {
        /// Tool name.
        tool: String,
        /// Outcome payload handed back to the model.
        result: Value,
        /// Compact one-line summary for display.
        #[serde(rename = "resultSummary")]
        result_summary: String,
    },

    /// The model produced a tool-free turn — its text is the final answer.
    #[serde(rename = "final_response")]
    FinalResponse {
        /// Iteration (1-based) on which the final answer was produced.
        iteration: u32,
        /// Number of text blocks in the final turn.
        #[serde(rename = "textBlockCount")]
        text_block_count: u32,
    },

    /// The session failed. Terminal.
    #[serde(rename = "error")]
    ErrorOccurred {
        /// Human-readable error message.
        error: String,
    },

    /// The session ended. Always the last event on the channel.
    #[serde(rename = "end")]
    SessionEnded {
        /// Total iterations executed for this turn.
        #[serde(rename = "totalIterations")]
        total_iterations: u32,
        /// Session ID, for resuming on the next turn.
        #[serde(rename = "sessionId")]
        session_id: String,
    },
}

impl StreamEvent {
    /// Wire discriminator string for this event.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ContentDelta { .. } => "content_delta",
            Self::ToolStarted { .. } => "tool_use",
            Self::ToolFinished { .. } => "tool_result",
            Self::FinalResponse { .. } => "final_response",
            Self::ErrorOccurred { .. } => "error",
            Self::SessionEnded { .. } => "end",
        }
    }

    /// Whether this event terminates the channel.
    ///
    /// A session ends either with a `final_response`/`end` pair (the
    /// `end` closes the channel) or with a single `error` event.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::SessionEnded { .. } | Self::ErrorOccurred { .. })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
