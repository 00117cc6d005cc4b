//! Conversation orchestration runtime.
//!
//! Drives the bounded multi-turn loop for one conversational turn: invoke
//! the model, interpret its streamed output, dispatch tool requests in
//! order, feed diagnostics back on failure, and push ordered wire events
//! to the waiting client. Sessions are isolated; within a session
//! everything is strictly sequential.

pub mod dispatcher;
pub mod errors;
pub mod multiplexer;
pub mod orchestrator;
pub mod persister;
pub mod phase;
pub mod pruning;
pub mod sessions;
pub mod stream_processor;

pub use errors::{Result, RuntimeError};
pub use multiplexer::{EventMultiplexer, SessionStream, channel};
pub use orchestrator::{ConversationOrchestrator, OrchestratorConfig};
pub use persister::TranscriptPersister;
pub use pruning::PruningPolicy;
pub use sessions::SessionRegistry;
