//! Sequential tool dispatch for one model turn.
//!
//! Tool requests are dispatched and awaited one at a time, in the order
//! the model issued them — later calls may be informed by the same turn's
//! earlier text. Failures never abort the session: they are classified
//! into structured diagnostics and handed back to the model as ordinary
//! outcomes so the next iteration can self-correct.

use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use cohort_core::content::ContentBlock;
use cohort_core::events::StreamEvent;
use cohort_core::ids::{SessionId, TenantId};
use cohort_tools::diagnostics::classify;
use cohort_tools::errors::ToolError;
use cohort_tools::registry::ToolRegistry;
use cohort_tools::traits::ToolContext;

use crate::multiplexer::EventMultiplexer;

/// A locally-dispatchable tool request extracted from a model turn.
#[derive(Clone, Debug)]
pub struct LocalRequest {
    /// Tool request ID.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Tool input.
    pub input: Map<String, Value>,
}

/// One dispatched request's resolved outcome.
#[derive(Clone, Debug)]
pub struct DispatchOutcome {
    /// Tool request ID.
    pub request_id: String,
    /// Tool name.
    pub tool_name: String,
    /// Tool input, as dispatched.
    pub input: Map<String, Value>,
    /// The outcome block fed back to the model.
    pub block: ContentBlock,
}

/// Identity threaded through every dispatch in a turn.
#[derive(Clone, Debug)]
pub struct DispatchScope {
    /// Session the requests belong to.
    pub session_id: SessionId,
    /// Tenant whose data the tools may touch.
    pub tenant_id: TenantId,
    /// Most recent user turn text, for requirement inference.
    pub user_text: String,
}

/// Dispatch a turn's local tool requests in order.
///
/// Requests reached after cancellation are not executed; they resolve to
/// a cancelled outcome so the request/outcome pairing stays intact. A
/// request already executing when cancellation arrives runs to
/// completion.
pub async fn dispatch_requests(
    requests: Vec<LocalRequest>,
    registry: &ToolRegistry,
    scope: &DispatchScope,
    mux: &EventMultiplexer,
    cancel: &CancellationToken,
) -> Vec<DispatchOutcome> {
    let mut outcomes = Vec::with_capacity(requests.len());

    for request in requests {
        let outcome = if cancel.is_cancelled() {
            warn!(
                tool = request.name,
                tool_id = request.id,
                "skipping dispatch, session cancelled"
            );
            cancelled_outcome(&request)
        } else {
            dispatch_one(&request, registry, scope, mux, cancel).await
        };
        outcomes.push(outcome);
    }

    outcomes
}

#[allow(clippy::cast_possible_truncation)]
async fn dispatch_one(
    request: &LocalRequest,
    registry: &ToolRegistry,
    scope: &DispatchScope,
    mux: &EventMultiplexer,
    cancel: &CancellationToken,
) -> DispatchOutcome {
    let start = Instant::now();

    let Some(tool) = registry.get(&request.name) else {
        let err = ToolError::ToolNotFound {
            name: request.name.clone(),
        };
        return failed_outcome(request, &err, mux).await;
    };

    let ctx = ToolContext {
        tool_request_id: request.id.clone(),
        session_id: scope.session_id.clone(),
        tenant_id: scope.tenant_id.clone(),
        user_text: scope.user_text.clone(),
        cancellation: cancel.clone(),
    };

    let execution = tool.execute(request.input.clone(), &ctx);
    let result = match tool.timeout_ms() {
        Some(timeout_ms) => match tokio::time::timeout(Duration::from_millis(timeout_ms), execution)
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout { timeout_ms }),
        },
        None => execution.await,
    };

    match result {
        Ok(result) => {
            debug!(
                tool = request.name,
                tool_id = request.id,
                duration_ms = start.elapsed().as_millis() as u64,
                is_error = result.failed(),
                "tool executed"
            );
            let block = if result.failed() {
                ContentBlock::tool_error(&request.id, result.content.clone())
            } else {
                ContentBlock::tool_outcome(&request.id, result.content.clone())
            };
            let _ = mux
                .emit_tool_finished(
                    &request.id,
                    StreamEvent::ToolFinished {
                        tool: request.name.clone(),
                        result: result.content,
                        result_summary: result.summary,
                    },
                )
                .await;
            DispatchOutcome {
                request_id: request.id.clone(),
                tool_name: request.name.clone(),
                input: request.input.clone(),
                block,
            }
        }
        Err(err) => failed_outcome(request, &err, mux).await,
    }
}

async fn failed_outcome(
    request: &LocalRequest,
    err: &ToolError,
    mux: &EventMultiplexer,
) -> DispatchOutcome {
    let diagnostic = classify(&request.name, &err.to_string(), &request.input);
    warn!(
        tool = request.name,
        tool_id = request.id,
        kind = ?diagnostic.kind,
        error = %err,
        "tool failed, returning diagnostic"
    );
    let payload = diagnostic.to_outcome();
    let _ = mux
        .emit_tool_finished(
            &request.id,
            StreamEvent::ToolFinished {
                tool: request.name.clone(),
                result: payload.clone(),
                result_summary: format!("{} failed: {}", request.name, truncate(&diagnostic.message, 80)),
            },
        )
        .await;
    DispatchOutcome {
        request_id: request.id.clone(),
        tool_name: request.name.clone(),
        input: request.input.clone(),
        block: ContentBlock::tool_error(&request.id, payload),
    }
}

fn cancelled_outcome(request: &LocalRequest) -> DispatchOutcome {
    let diagnostic = classify(&request.name, &ToolError::Cancelled.to_string(), &request.input);
    DispatchOutcome {
        request_id: request.id.clone(),
        tool_name: request.name.clone(),
        input: request.input.clone(),
        block: ContentBlock::tool_error(&request.id, diagnostic.to_outcome()),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        s
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        &s[..end]
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
