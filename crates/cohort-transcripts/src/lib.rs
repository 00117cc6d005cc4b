//! # cohort-transcripts
//!
//! `SQLite`-backed transcript store. Persists sessions, their append-only
//! message history, per-turn token deltas, and a per-invocation tool audit
//! trail. Writes are best-effort relative to the live conversation: the
//! runtime logs and swallows persistence failures.

pub mod connection;
pub mod errors;
pub mod migrations;
pub mod store;

pub use connection::{ConnectionConfig, ConnectionPool, new_file, new_in_memory};
pub use errors::{Result, TranscriptError};
pub use store::{
    ListSessionsOptions, SessionRecord, ToolInvocationRecord, ToolInvocationRow, TranscriptStore,
    TurnMeta,
};
