//! Core trait and DI abstractions for the tool system.
//!
//! Defines [`CohortTool`] — the trait every tool implements — plus the
//! dependency injection traits tools use to reach external services. The
//! server wires concrete implementations; tests substitute mocks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use cohort_core::ids::{SessionId, TenantId};
use cohort_core::tools::{ToolDefinition, ToolResult};
use cohort_eval::types::Breakdown;

use crate::errors::ToolError;

// ─────────────────────────────────────────────────────────────────────────────
// Tool context
// ─────────────────────────────────────────────────────────────────────────────

/// Execution context passed to every tool invocation.
///
/// Carries the request's cross-cutting identity explicitly rather than
/// through ambient state; everything a tool needs travels with the call.
#[derive(Clone, Debug)]
pub struct ToolContext {
    /// Unique ID of this tool request.
    pub tool_request_id: String,
    /// Session the request belongs to.
    pub session_id: SessionId,
    /// Tenant whose data the tool may touch.
    pub tenant_id: TenantId,
    /// Text of the most recent user turn, for requirement inference.
    pub user_text: String,
    /// Cancellation token for cooperative cancellation.
    pub cancellation: CancellationToken,
}

// ─────────────────────────────────────────────────────────────────────────────
// CohortTool trait
// ─────────────────────────────────────────────────────────────────────────────

/// The core trait that every tool must implement.
///
/// Each tool provides:
/// - **Schema** via [`definition()`](CohortTool::definition) — advertised to the model
/// - **Execution** via [`execute()`](CohortTool::execute) — invoked with JSON input
#[async_trait]
pub trait CohortTool: Send + Sync {
    /// Tool name — the exact string sent to/from the model.
    fn name(&self) -> &str;

    /// Optional per-tool timeout in milliseconds.
    fn timeout_ms(&self) -> Option<u64> {
        None
    }

    /// Generate the [`ToolDefinition`] schema for the model.
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with JSON input.
    async fn execute(
        &self,
        input: Map<String, Value>,
        ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Analytics collaborator
// ─────────────────────────────────────────────────────────────────────────────

/// Output of a read-only analytical query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutput {
    /// Column names in result order.
    pub columns: Vec<String>,
    /// Result rows.
    pub rows: Vec<Vec<Value>>,
    /// Total rows matched (may exceed `rows.len()` when truncated).
    pub row_count: u64,
    /// Demographic breakdowns, when the data source can supply them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<Breakdown>,
    /// Size of the tenant's full addressable population, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_population: Option<u64>,
}

/// Analytical data-source operations, scoped by tenant.
///
/// Implementations must enforce read-only semantics at the source; the
/// query tool additionally rejects mutating statements before dispatch.
#[async_trait]
pub trait AnalyticsOps: Send + Sync {
    /// Describe the tenant's available tables, columns, and sample values.
    async fn discover_schema(&self, tenant_id: &TenantId) -> Result<Value, ToolError>;

    /// Run a read-only query against the tenant's data.
    async fn run_query(&self, tenant_id: &TenantId, sql: &str) -> Result<QueryOutput, ToolError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
