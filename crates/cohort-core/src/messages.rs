//! Conversation message and session types.
//!
//! A [`ConversationSession`] owns an ordered, append-only sequence of
//! [`Message`]s. Messages are immutable once appended; the session is
//! mutated only by appending and by advancing its counters/lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::ContentBlock;
use crate::ids::{SessionId, TenantId, UserId};

// ─────────────────────────────────────────────────────────────────────────────
// Message
// ─────────────────────────────────────────────────────────────────────────────

/// Message author role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// End user (also carries locally-produced tool outcomes).
    User,
    /// The model.
    Assistant,
}

/// A single message in a conversation. Immutable once appended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Author role.
    pub role: Role,
    /// Ordered content blocks.
    pub blocks: Vec<ContentBlock>,
    /// Production timestamp (UTC).
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a user message from plain text.
    #[must_use]
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            blocks: vec![ContentBlock::text(text)],
            timestamp: Utc::now(),
        }
    }

    /// Create a user message carrying tool outcome blocks.
    #[must_use]
    pub fn tool_outcomes(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            blocks,
            timestamp: Utc::now(),
        }
    }

    /// Create an assistant message from a turn's blocks.
    #[must_use]
    pub fn assistant(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            blocks,
            timestamp: Utc::now(),
        }
    }

    /// IDs of the tool requests contained in this message.
    #[must_use]
    pub fn tool_request_ids(&self) -> Vec<&str> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolRequest { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Model invocation parameters fixed for a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelParams {
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Maximum output tokens per model turn.
    pub max_tokens: u32,
    /// Maximum orchestration iterations per user turn.
    pub max_iterations: u32,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-5".into(),
            temperature: 0.2,
            max_tokens: 8192,
            max_iterations: 12,
        }
    }
}

/// Cumulative token counters for a session. Only ever increase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCounters {
    /// Total input tokens across all model invocations.
    pub input_tokens: u64,
    /// Total output tokens across all model invocations.
    pub output_tokens: u64,
}

impl TokenCounters {
    /// Add a turn's usage to the running totals.
    pub fn add(&mut self, input: u64, output: u64) {
        self.input_tokens += input;
        self.output_tokens += output;
    }
}

/// Session lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Accepting turns.
    Active,
    /// Terminated (normally or on failure); no further appends.
    Completed,
}

/// A conversation session: identity, ordered message history, model
/// parameters, token accounting, and lifecycle.
///
/// Exclusively owned by the orchestrating task for its lifetime. The
/// message sequence is append-only; total order reflects production order.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSession {
    /// Session identity.
    pub session_id: SessionId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Initiating user.
    pub user_id: UserId,
    /// Ordered, append-only message history.
    pub messages: Vec<Message>,
    /// Model invocation parameters.
    pub params: ModelParams,
    /// Cumulative token counters.
    pub tokens: TokenCounters,
    /// Lifecycle flag.
    pub status: SessionStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl ConversationSession {
    /// Create a fresh, active session.
    #[must_use]
    pub fn new(tenant_id: TenantId, user_id: UserId, params: ModelParams) -> Self {
        let now = Utc::now();
        Self {
            session_id: SessionId::new(),
            tenant_id,
            user_id,
            messages: Vec::new(),
            params,
            tokens: TokenCounters::default(),
            status: SessionStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message. The only mutation path for the history.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    /// Mark the session completed. Idempotent.
    pub fn complete(&mut self) {
        self.status = SessionStatus::Completed;
        self.updated_at = Utc::now();
    }

    /// Whether the session is still accepting turns.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Text of the most recent user message, if any.
    #[must_use]
    pub fn last_user_text(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| crate::content::extract_text(&m.blocks))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
