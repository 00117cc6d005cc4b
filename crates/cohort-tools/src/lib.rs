//! # cohort-tools
//!
//! Tool capability registry and the built-in tools the model can invoke:
//! schema discovery, read-only query execution (with quality evaluation of
//! count-style results), and the tenant-scoped memory store. Tool failures
//! are classified into structured diagnostics so the model can
//! self-correct within the conversation.

pub mod diagnostics;
pub mod errors;
pub mod memory;
pub mod query;
pub mod registry;
pub mod schema;
pub mod traits;

pub use diagnostics::{DiagnosticKind, StructuredDiagnostic, classify};
pub use errors::ToolError;
pub use registry::ToolRegistry;
pub use traits::{AnalyticsOps, CohortTool, QueryOutput, ToolContext};
