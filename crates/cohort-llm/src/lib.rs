//! # cohort-llm
//!
//! Model provider abstraction. The orchestrator drives conversations
//! through the [`ModelProvider`](provider::ModelProvider) trait and
//! consumes the [`ModelEvent`](events::ModelEvent) stream it returns;
//! concrete backends live behind that seam.

pub mod events;
pub mod mock;
pub mod provider;

pub use events::{ModelEvent, StopReason, TokenUsage};
pub use provider::{
    ModelError, ModelEventStream, ModelProvider, ModelRequest, ModelResult, ModelStreamOptions,
};
