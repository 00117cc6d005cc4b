//! # cohort-core
//!
//! Foundation types for the conversational audience-building engine:
//! branded IDs, content blocks, conversation sessions, tool definitions,
//! and the wire event protocol pushed to clients.

pub mod content;
pub mod events;
pub mod ids;
pub mod messages;
pub mod tools;
