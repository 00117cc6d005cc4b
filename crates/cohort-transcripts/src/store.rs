//! Transcript store — session lifecycle, message appends, and audit reads.
//!
//! All methods are synchronous over a pooled connection; appends run in a
//! transaction so a message, its counter bumps, and its tool audit rows
//! land atomically or not at all.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use cohort_core::ids::{SessionId, TenantId, UserId};
use cohort_core::messages::{ConversationSession, Message, Role};

use crate::connection::ConnectionPool;
use crate::errors::{Result, TranscriptError};
use crate::migrations::run_migrations;

/// Default workflow tag for sessions created by the conversation engine.
pub const DEFAULT_WORKFLOW: &str = "audience_builder";

// ─────────────────────────────────────────────────────────────────────────────
// Row types
// ─────────────────────────────────────────────────────────────────────────────

/// Denormalized session row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Session ID.
    pub session_id: String,
    /// Owning tenant.
    pub tenant_id: String,
    /// Initiating user.
    pub user_id: String,
    /// Logical application/workflow tag.
    pub workflow: String,
    /// Model ID used by the session.
    pub model: String,
    /// Lifecycle status (`active` / `completed`).
    pub status: String,
    /// Number of persisted messages.
    pub message_count: u64,
    /// Cumulative input tokens.
    pub input_tokens: u64,
    /// Cumulative output tokens.
    pub output_tokens: u64,
    /// Creation time.
    pub created_at: String,
    /// Last mutation time.
    pub updated_at: String,
}

/// One tool invocation recorded alongside an assistant message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocationRecord {
    /// Tool request ID.
    pub tool_request_id: String,
    /// Tool name.
    pub tool_name: String,
    /// Tool input.
    pub input: Value,
    /// Tool result, when one was produced.
    pub result: Option<Value>,
    /// Whether the model-service provider fulfilled this request itself.
    pub server_tool: bool,
}

/// A tool invocation as read back for audit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocationRow {
    /// Sequence number of the assistant message this invocation belongs to.
    pub message_seq: u64,
    /// The recorded invocation.
    #[serde(flatten)]
    pub record: ToolInvocationRecord,
    /// When the invocation was recorded.
    pub created_at: String,
}

/// Per-turn metadata recorded with an assistant append.
#[derive(Clone, Debug, Default)]
pub struct TurnMeta {
    /// Input tokens consumed by the turn.
    pub input_tokens: u64,
    /// Output tokens produced by the turn.
    pub output_tokens: u64,
    /// Tools invoked during the turn, in dispatch order.
    pub invocations: Vec<ToolInvocationRecord>,
}

/// Options for listing a tenant/user's sessions.
#[derive(Clone, Debug)]
pub struct ListSessionsOptions {
    /// Restrict to one workflow tag.
    pub workflow: Option<String>,
    /// Maximum results.
    pub limit: u32,
    /// Results to skip.
    pub offset: u32,
}

impl Default for ListSessionsOptions {
    fn default() -> Self {
        Self {
            workflow: None,
            limit: 50,
            offset: 0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

/// `SQLite`-backed transcript store.
pub struct TranscriptStore {
    pool: ConnectionPool,
}

#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
impl TranscriptStore {
    /// Create a store over the given pool, applying pending migrations.
    pub fn new(pool: ConnectionPool) -> Result<Self> {
        let conn = pool.get()?;
        let _ = run_migrations(&conn)?;
        drop(conn);
        Ok(Self { pool })
    }

    /// Persist a session row if one does not exist yet.
    ///
    /// Idempotent: a session that already has a row is left untouched, so
    /// callers can ensure presence at the start of every turn without
    /// clobbering counters accumulated by earlier turns.
    pub fn create_session(&self, session: &ConversationSession, workflow: &str) -> Result<()> {
        let conn = self.pool.get()?;
        let _ = conn.execute(
            "INSERT OR IGNORE INTO sessions
                (session_id, tenant_id, user_id, workflow, model, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'active', ?6, ?7)",
            params![
                session.session_id.as_str(),
                session.tenant_id.as_str(),
                session.user_id.as_str(),
                workflow,
                session.params.model,
                session.created_at.to_rfc3339(),
                session.updated_at.to_rfc3339(),
            ],
        )?;
        debug!(session_id = session.session_id.as_str(), "session persisted");
        Ok(())
    }

    /// Append a message, returning its sequence number.
    ///
    /// Counters, the message row, and any tool audit rows land in one
    /// transaction.
    pub fn append_message(
        &self,
        session_id: &SessionId,
        message: &Message,
        meta: &TurnMeta,
    ) -> Result<u64> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let exists: Option<String> = tx
            .query_row(
                "SELECT session_id FROM sessions WHERE session_id = ?1",
                [session_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(TranscriptError::SessionNotFound(
                session_id.as_str().to_owned(),
            ));
        }

        let seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq), -1) + 1 FROM messages WHERE session_id = ?1",
            [session_id.as_str()],
            |row| row.get(0),
        )?;

        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        let _ = tx.execute(
            "INSERT INTO messages (session_id, seq, role, blocks, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session_id.as_str(),
                seq,
                role,
                serde_json::to_string(&message.blocks)?,
                message.timestamp.to_rfc3339(),
            ],
        )?;

        let _ = tx.execute(
            "UPDATE sessions SET
                message_count = message_count + 1,
                input_tokens = input_tokens + ?2,
                output_tokens = output_tokens + ?3,
                updated_at = ?4
             WHERE session_id = ?1",
            params![
                session_id.as_str(),
                meta.input_tokens as i64,
                meta.output_tokens as i64,
                Utc::now().to_rfc3339(),
            ],
        )?;

        for invocation in &meta.invocations {
            let _ = tx.execute(
                "INSERT INTO tool_invocations
                    (session_id, message_seq, tool_request_id, tool_name, input, result,
                     server_tool, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    session_id.as_str(),
                    seq,
                    invocation.tool_request_id,
                    invocation.tool_name,
                    serde_json::to_string(&invocation.input)?,
                    invocation
                        .result
                        .as_ref()
                        .map(serde_json::to_string)
                        .transpose()?,
                    invocation.server_tool,
                    Utc::now().to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        Ok(seq as u64)
    }

    /// Mark a session completed. Idempotent.
    pub fn complete_session(&self, session_id: &SessionId) -> Result<()> {
        let conn = self.pool.get()?;
        let changed = conn.execute(
            "UPDATE sessions SET status = 'completed', updated_at = ?2 WHERE session_id = ?1",
            params![session_id.as_str(), Utc::now().to_rfc3339()],
        )?;
        if changed == 0 {
            return Err(TranscriptError::SessionNotFound(
                session_id.as_str().to_owned(),
            ));
        }
        Ok(())
    }

    /// Read a single session's denormalized record.
    pub fn get_session(&self, session_id: &SessionId) -> Result<SessionRecord> {
        let conn = self.pool.get()?;
        conn.query_row(
            "SELECT session_id, tenant_id, user_id, workflow, model, status,
                    message_count, input_tokens, output_tokens, created_at, updated_at
             FROM sessions WHERE session_id = ?1",
            [session_id.as_str()],
            Self::session_from_row,
        )
        .optional()?
        .ok_or_else(|| TranscriptError::SessionNotFound(session_id.as_str().to_owned()))
    }

    /// Read back a session's messages in append order.
    pub fn get_messages(&self, session_id: &SessionId) -> Result<Vec<Message>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT role, blocks, created_at FROM messages
             WHERE session_id = ?1 ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map([session_id.as_str()], |row| {
            let role: String = row.get(0)?;
            let blocks: String = row.get(1)?;
            let created_at: String = row.get(2)?;
            Ok((role, blocks, created_at))
        })?;

        let mut messages = Vec::new();
        for row in rows {
            let (role, blocks, created_at) = row?;
            messages.push(Message {
                role: if role == "assistant" {
                    Role::Assistant
                } else {
                    Role::User
                },
                blocks: serde_json::from_str(&blocks)?,
                timestamp: parse_timestamp(&created_at),
            });
        }
        Ok(messages)
    }

    /// List a tenant/user's sessions, newest first, with pagination and an
    /// optional workflow filter.
    pub fn list_sessions(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId,
        options: &ListSessionsOptions,
    ) -> Result<Vec<SessionRecord>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT session_id, tenant_id, user_id, workflow, model, status,
                    message_count, input_tokens, output_tokens, created_at, updated_at
             FROM sessions
             WHERE tenant_id = ?1 AND user_id = ?2
               AND (?3 IS NULL OR workflow = ?3)
             ORDER BY created_at DESC
             LIMIT ?4 OFFSET ?5",
        )?;
        let rows = stmt.query_map(
            params![
                tenant_id.as_str(),
                user_id.as_str(),
                options.workflow,
                options.limit,
                options.offset,
            ],
            Self::session_from_row,
        )?;
        rows.map(|r| r.map_err(TranscriptError::from)).collect()
    }

    /// Read a session's tool invocation audit trail in recording order.
    pub fn tool_invocations(&self, session_id: &SessionId) -> Result<Vec<ToolInvocationRow>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT message_seq, tool_request_id, tool_name, input, result, server_tool,
                    created_at
             FROM tool_invocations WHERE session_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([session_id.as_str()], |row| {
            let message_seq: i64 = row.get(0)?;
            let input: String = row.get(3)?;
            let result: Option<String> = row.get(4)?;
            Ok((
                message_seq,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                input,
                result,
                row.get::<_, bool>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut invocations = Vec::new();
        for row in rows {
            let (message_seq, tool_request_id, tool_name, input, result, server_tool, created_at) =
                row?;
            invocations.push(ToolInvocationRow {
                message_seq: message_seq as u64,
                record: ToolInvocationRecord {
                    tool_request_id,
                    tool_name,
                    input: serde_json::from_str(&input)?,
                    result: result.as_deref().map(serde_json::from_str).transpose()?,
                    server_tool,
                },
                created_at,
            });
        }
        Ok(invocations)
    }

    fn session_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRecord> {
        Ok(SessionRecord {
            session_id: row.get(0)?,
            tenant_id: row.get(1)?,
            user_id: row.get(2)?,
            workflow: row.get(3)?,
            model: row.get(4)?,
            status: row.get(5)?,
            message_count: row.get::<_, i64>(6)? as u64,
            input_tokens: row.get::<_, i64>(7)? as u64,
            output_tokens: row.get::<_, i64>(8)? as u64,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
