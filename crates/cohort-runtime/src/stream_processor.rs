//! Model stream consumption — accumulates content blocks, emits deltas.
//!
//! Consumes one model invocation's [`ModelEvent`] stream and assembles
//! the turn's ordered [`ContentBlock`] sequence. Text deltas are pushed
//! to the client as `content_delta` events decorated with the phase
//! heuristics; tool requests are announced as `tool_use` events but not
//! dispatched here.

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use cohort_core::content::ContentBlock;
use cohort_core::events::StreamEvent;
use cohort_llm::events::{ModelEvent, StopReason, TokenUsage};
use cohort_llm::provider::{ModelError, ModelEventStream};

use crate::errors::RuntimeError;
use crate::multiplexer::EventMultiplexer;
use crate::phase::PhaseTracker;

/// Result of consuming one model invocation stream.
#[derive(Debug)]
pub struct TurnOutcome {
    /// Ordered blocks produced by the turn.
    pub blocks: Vec<ContentBlock>,
    /// Why the model stopped, when the stream completed.
    pub stop_reason: Option<StopReason>,
    /// Token usage for the invocation.
    pub usage: TokenUsage,
    /// Whether consumption stopped early due to cancellation.
    pub interrupted: bool,
}

impl TurnOutcome {
    fn interrupted(blocks: Vec<ContentBlock>, usage: TokenUsage) -> Self {
        Self {
            blocks,
            stop_reason: None,
            usage,
            interrupted: true,
        }
    }
}

/// Consume a model stream to completion (or cancellation).
pub async fn process_model_stream(
    mut stream: ModelEventStream,
    phase: &mut PhaseTracker,
    mux: &EventMultiplexer,
    cancel: &CancellationToken,
) -> Result<TurnOutcome, RuntimeError> {
    let mut blocks: Vec<ContentBlock> = Vec::new();
    let mut text_acc = String::with_capacity(1024);
    let mut turn_exploratory = false;

    loop {
        // biased: prefer cancellation when both are ready
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                flush_text(&mut blocks, &mut text_acc);
                return Ok(TurnOutcome::interrupted(blocks, TokenUsage::default()));
            }
            event = stream.next() => event,
        };

        match event {
            None => {
                return Err(RuntimeError::Internal(
                    "model stream ended without a done event".into(),
                ));
            }
            Some(Err(ModelError::Cancelled)) => {
                flush_text(&mut blocks, &mut text_acc);
                return Ok(TurnOutcome::interrupted(blocks, TokenUsage::default()));
            }
            Some(Err(e)) => return Err(RuntimeError::Model(e)),
            Some(Ok(ModelEvent::TextDelta { text })) => {
                text_acc.push_str(&text);
                let (exploratory, final_result) = phase.observe(&text_acc);
                turn_exploratory |= exploratory;
                let _ = mux
                    .emit(StreamEvent::ContentDelta {
                        content: text,
                        is_exploration: exploratory,
                        is_final_result: final_result,
                        phase: phase.phase(),
                    })
                    .await;
            }
            Some(Ok(ModelEvent::ToolRequested {
                id,
                name,
                input,
                server_tool,
            })) => {
                flush_text(&mut blocks, &mut text_acc);
                let _ = mux
                    .emit(StreamEvent::ToolStarted {
                        tool: name.clone(),
                        tool_id: id.clone(),
                        input: input.clone(),
                        is_server_tool: server_tool,
                    })
                    .await;
                blocks.push(ContentBlock::ToolRequest {
                    id,
                    name,
                    input,
                    server_tool,
                });
            }
            Some(Ok(ModelEvent::ServerToolOutcome {
                request_id,
                content,
                is_error,
            })) => {
                flush_text(&mut blocks, &mut text_acc);
                blocks.push(ContentBlock::ToolOutcome {
                    request_id,
                    content,
                    is_error,
                });
            }
            Some(Ok(ModelEvent::Done { stop_reason, usage })) => {
                flush_text(&mut blocks, &mut text_acc);
                phase.end_iteration(turn_exploratory);
                debug!(
                    ?stop_reason,
                    input_tokens = usage.input_tokens,
                    output_tokens = usage.output_tokens,
                    blocks = blocks.len(),
                    "model turn complete"
                );
                return Ok(TurnOutcome {
                    blocks,
                    stop_reason: Some(stop_reason),
                    usage,
                    interrupted: false,
                });
            }
        }
    }
}

fn flush_text(blocks: &mut Vec<ContentBlock>, acc: &mut String) {
    if !acc.is_empty() {
        blocks.push(ContentBlock::text(std::mem::take(acc)));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
