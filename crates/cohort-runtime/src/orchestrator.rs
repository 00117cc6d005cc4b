//! The conversation orchestrator — the bounded multi-turn loop.
//!
//! One `run` drives one conversational turn: append the user's query,
//! then repeatedly invoke the model, dispatch the tools it requests, and
//! feed outcomes back, until the model produces a tool-free turn or the
//! iteration ceiling is reached. Everything the client sees flows through
//! the session's [`EventMultiplexer`].

use std::sync::Arc;

use tracing::{error, info, instrument};

use cohort_core::content::{ContentBlock, text_block_count};
use cohort_core::events::StreamEvent;
use cohort_core::messages::{ConversationSession, Message};
use cohort_llm::provider::{ModelProvider, ModelRequest, ModelStreamOptions};
use cohort_tools::registry::ToolRegistry;
use cohort_transcripts::{ToolInvocationRecord, TurnMeta};

use crate::dispatcher::{DispatchOutcome, DispatchScope, LocalRequest, dispatch_requests};
use crate::errors::Result;
use crate::multiplexer::{EventMultiplexer, SessionStream, channel};
use crate::persister::TranscriptPersister;
use crate::phase::PhaseTracker;
use crate::pruning::PruningPolicy;
use crate::sessions::SessionRegistry;
use crate::stream_processor::process_model_stream;

/// Default system instruction for the audience-building loop.
const SYSTEM_PROMPT: &str = "\
You are an audience-building assistant for a retail-media platform. \
Help the user define an audience segment of shoppers. Use discover_schema \
to learn what data is available, run_audience_query to count and inspect \
candidate segments, and audience_memory to keep notes across sessions. \
Queries must be read-only. When a count query returns an evaluation, use \
its issues and suggestions to refine the segment before presenting it. \
When the segment is ready, present it with its size and how it matches \
the user's requirements.";

/// Tunables for the orchestration loop.
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// System instruction sent with every model invocation.
    pub system_prompt: String,
    /// Event channel capacity per session.
    pub channel_capacity: usize,
    /// Context-pruning policy.
    pub pruning: PruningPolicy,
    /// Non-exploratory iterations before the phase settles to finalizing.
    pub finalize_after_iterations: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            system_prompt: SYSTEM_PROMPT.to_owned(),
            channel_capacity: 256,
            pruning: PruningPolicy::default(),
            finalize_after_iterations: 3,
        }
    }
}

/// Drives conversation sessions. One instance serves all sessions.
pub struct ConversationOrchestrator {
    provider: Arc<dyn ModelProvider>,
    registry: Arc<ToolRegistry>,
    persister: Option<TranscriptPersister>,
    sessions: SessionRegistry,
    config: OrchestratorConfig,
}

impl ConversationOrchestrator {
    /// Create an orchestrator over the given collaborators.
    #[must_use]
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        registry: Arc<ToolRegistry>,
        persister: Option<TranscriptPersister>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            provider,
            registry,
            persister,
            sessions: SessionRegistry::new(),
            config,
        }
    }

    /// Active-session registry, for busy checks and aborts.
    #[must_use]
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Start one conversational turn.
    ///
    /// The loop runs on a spawned task; the returned stream yields wire
    /// events in production order and ends after the terminal event.
    /// Dropping the stream cancels the loop cooperatively.
    pub fn run(
        self: &Arc<Self>,
        session: ConversationSession,
        user_text: String,
    ) -> Result<SessionStream> {
        let (mux, stream) = channel(session.session_id.clone(), self.config.channel_capacity);
        self.sessions.begin(&session.session_id, mux.cancellation())?;

        let this = Arc::clone(self);
        drop(tokio::spawn(async move {
            this.drive(session, user_text, mux).await;
        }));
        Ok(stream)
    }

    #[instrument(skip_all, fields(session_id = %session.session_id, model = self.provider.model()))]
    #[allow(clippy::too_many_lines, clippy::cast_possible_truncation)]
    async fn drive(
        &self,
        mut session: ConversationSession,
        user_text: String,
        mux: EventMultiplexer,
    ) {
        let cancel = mux.cancellation();
        let session_id = session.session_id.clone();

        // Ensure the session row exists before anything is appended. A new
        // session may arrive with client-seeded history, so presence cannot
        // be inferred from an empty message list; the store treats an
        // existing row as a no-op.
        if let Some(p) = &self.persister {
            p.record_session(&session).await;
        }

        let user_message = Message::user_text(&user_text);
        session.append(user_message.clone());
        if let Some(p) = &self.persister {
            p.record_message(&session_id, &user_message, TurnMeta::default())
                .await;
        }

        let mut phase = PhaseTracker::new(self.config.finalize_after_iterations);
        let max_iterations = session.params.max_iterations.max(1);
        let mut iterations = 0u32;
        let mut answered = false;

        for iteration in 1..=max_iterations {
            if cancel.is_cancelled() {
                break;
            }
            iterations = iteration;

            let history = self.config.pruning.prune(&session.messages);
            let request = ModelRequest::new(history, self.registry.definitions())
                .with_system(self.config.system_prompt.clone());
            let options = ModelStreamOptions {
                max_tokens: Some(session.params.max_tokens),
                temperature: Some(session.params.temperature),
                stop_sequences: None,
            };

            let stream = match self.provider.stream(&request, &options).await {
                Ok(stream) => stream,
                Err(e) => {
                    error!(iteration, error = %e, "model invocation failed");
                    let _ = mux
                        .emit(StreamEvent::ErrorOccurred {
                            error: e.to_string(),
                        })
                        .await;
                    self.sessions.finish(&session_id);
                    return;
                }
            };

            let turn = match process_model_stream(stream, &mut phase, &mux, &cancel).await {
                Ok(turn) => turn,
                Err(e) => {
                    error!(iteration, error = %e, "model stream failed");
                    let _ = mux
                        .emit(StreamEvent::ErrorOccurred {
                            error: e.to_string(),
                        })
                        .await;
                    self.sessions.finish(&session_id);
                    return;
                }
            };

            session
                .tokens
                .add(turn.usage.input_tokens, turn.usage.output_tokens);

            if turn.interrupted {
                if !turn.blocks.is_empty() {
                    let partial = Message::assistant(turn.blocks);
                    session.append(partial.clone());
                    if let Some(p) = &self.persister {
                        p.record_message(&session_id, &partial, TurnMeta::default())
                            .await;
                    }
                }
                break;
            }

            let assistant = Message::assistant(turn.blocks);
            let has_requests = assistant.blocks.iter().any(ContentBlock::is_tool_request);
            session.append(assistant.clone());

            if !has_requests {
                // Tool-free turn: the text is the final answer.
                if let Some(p) = &self.persister {
                    let meta = TurnMeta {
                        input_tokens: turn.usage.input_tokens,
                        output_tokens: turn.usage.output_tokens,
                        invocations: Vec::new(),
                    };
                    p.record_message(&session_id, &assistant, meta).await;
                }
                let _ = mux
                    .emit(StreamEvent::FinalResponse {
                        iteration,
                        text_block_count: text_block_count(&assistant.blocks) as u32,
                    })
                    .await;
                answered = true;
                break;
            }

            let local_requests: Vec<LocalRequest> = assistant
                .blocks
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::ToolRequest {
                        id,
                        name,
                        input,
                        server_tool: false,
                    } => Some(LocalRequest {
                        id: id.clone(),
                        name: name.clone(),
                        input: input.clone(),
                    }),
                    _ => None,
                })
                .collect();

            let scope = DispatchScope {
                session_id: session_id.clone(),
                tenant_id: session.tenant_id.clone(),
                user_text: user_text.clone(),
            };
            let dispatched =
                dispatch_requests(local_requests, &self.registry, &scope, &mux, &cancel).await;

            if let Some(p) = &self.persister {
                let meta = TurnMeta {
                    input_tokens: turn.usage.input_tokens,
                    output_tokens: turn.usage.output_tokens,
                    invocations: build_invocations(&assistant.blocks, &dispatched),
                };
                p.record_message(&session_id, &assistant, meta).await;
            }

            if !dispatched.is_empty() {
                let outcome_message =
                    Message::tool_outcomes(dispatched.into_iter().map(|d| d.block).collect());
                session.append(outcome_message.clone());
                if let Some(p) = &self.persister {
                    p.record_message(&session_id, &outcome_message, TurnMeta::default())
                        .await;
                }
            }
        }

        if answered || !cancel.is_cancelled() {
            // Normal completion or iteration-bound exhaustion. A
            // cancelled session stays incomplete.
            if !answered {
                info!(iterations, "iteration ceiling reached without a final answer");
            }
            session.complete();
            if let Some(p) = &self.persister {
                p.record_completion(&session_id).await;
            }
        }

        let _ = mux
            .emit(StreamEvent::SessionEnded {
                total_iterations: iterations,
                session_id: session_id.as_str().to_owned(),
            })
            .await;
        self.sessions.finish(&session_id);
    }
}

/// Assemble the audit records for one assistant turn.
///
/// Walks the turn's request blocks in order; local requests take their
/// result from the dispatcher, server-fulfilled ones from the outcome
/// block the model delivered in the same turn.
fn build_invocations(
    blocks: &[ContentBlock],
    dispatched: &[DispatchOutcome],
) -> Vec<ToolInvocationRecord> {
    let outcome_content = |request_id: &str| -> Option<serde_json::Value> {
        blocks.iter().find_map(|block| match block {
            ContentBlock::ToolOutcome {
                request_id: rid,
                content,
                ..
            } if rid == request_id => Some(content.clone()),
            _ => None,
        })
    };

    blocks
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolRequest {
                id,
                name,
                input,
                server_tool,
            } => {
                let result = if *server_tool {
                    outcome_content(id)
                } else {
                    dispatched
                        .iter()
                        .find(|d| d.request_id == *id)
                        .and_then(|d| match &d.block {
                            ContentBlock::ToolOutcome { content, .. } => Some(content.clone()),
                            _ => None,
                        })
                };
                Some(ToolInvocationRecord {
                    tool_request_id: id.clone(),
                    tool_name: name.clone(),
                    input: serde_json::Value::Object(input.clone()),
                    result,
                    server_tool: *server_tool,
                })
            }
            _ => None,
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::StreamExt;
    use parking_lot::Mutex;
    use serde_json::{Map, Value, json};

    use cohort_core::ids::{TenantId, UserId};
    use cohort_core::messages::ModelParams;
    use cohort_core::tools::{ToolDefinition, ToolInputSchema, ToolResult};
    use cohort_llm::events::{ModelEvent, StopReason, TokenUsage};
    use cohort_llm::provider::{ModelError, ModelEventStream, ModelResult};
    use cohort_tools::errors::ToolError;
    use cohort_tools::traits::{CohortTool, ToolContext};
    use cohort_transcripts::TranscriptStore;
    use cohort_transcripts::connection::{ConnectionConfig, new_in_memory};

    struct ScriptedProvider {
        turns: Mutex<VecDeque<Vec<ModelEvent>>>,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn new(turns: Vec<Vec<ModelEvent>>) -> Self {
            Self {
                turns: Mutex::new(turns.into()),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        fn model(&self) -> &str {
            "test-model"
        }

        async fn stream(
            &self,
            _request: &ModelRequest,
            _options: &ModelStreamOptions,
        ) -> ModelResult<ModelEventStream> {
            let _ = self.calls.fetch_add(1, Ordering::SeqCst);
            let Some(events) = self.turns.lock().pop_front() else {
                return Err(ModelError::Other {
                    message: "script exhausted".into(),
                });
            };
            Ok(Box::pin(async_stream::stream! {
                for event in events {
                    yield Ok(event);
                }
            }))
        }
    }

    struct EchoTool {
        completed: Arc<AtomicBool>,
        delay: Duration,
    }

    #[async_trait]
    impl CohortTool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "echo".into(),
                description: "echoes its input".into(),
                input_schema: ToolInputSchema::object(Map::new(), Vec::new()),
            }
        }

        async fn execute(
            &self,
            input: Map<String, Value>,
            _ctx: &ToolContext,
        ) -> std::result::Result<ToolResult, ToolError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.completed.store(true, Ordering::SeqCst);
            Ok(ToolResult::ok(Value::Object(input), "echoed"))
        }
    }

    fn tool_turn(id: &str) -> Vec<ModelEvent> {
        let mut input = Map::new();
        let _ = input.insert("note".into(), json!("checking"));
        vec![
            ModelEvent::TextDelta {
                text: "Let me check the data. ".into(),
            },
            ModelEvent::ToolRequested {
                id: id.into(),
                name: "echo".into(),
                input,
                server_tool: false,
            },
            ModelEvent::Done {
                stop_reason: StopReason::ToolUse,
                usage: TokenUsage {
                    input_tokens: 10,
                    output_tokens: 5,
                },
            },
        ]
    }

    fn final_turn() -> Vec<ModelEvent> {
        vec![
            ModelEvent::TextDelta {
                text: "## Audience\n500,000 shoppers match.".into(),
            },
            ModelEvent::Done {
                stop_reason: StopReason::EndTurn,
                usage: TokenUsage {
                    input_tokens: 20,
                    output_tokens: 7,
                },
            },
        ]
    }

    struct Harness {
        orchestrator: Arc<ConversationOrchestrator>,
        store: Arc<TranscriptStore>,
        provider: Arc<ScriptedProvider>,
        tool_completed: Arc<AtomicBool>,
    }

    fn harness(turns: Vec<Vec<ModelEvent>>, tool_delay: Duration) -> Harness {
        let provider = Arc::new(ScriptedProvider::new(turns));
        let tool_completed = Arc::new(AtomicBool::new(false));
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool {
            completed: Arc::clone(&tool_completed),
            delay: tool_delay,
        }));

        let pool = new_in_memory(&ConnectionConfig::default()).unwrap();
        let store = Arc::new(TranscriptStore::new(pool).unwrap());
        let persister = TranscriptPersister::new(Arc::clone(&store), "audience_builder");

        let orchestrator = Arc::new(ConversationOrchestrator::new(
            Arc::clone(&provider) as Arc<dyn ModelProvider>,
            Arc::new(registry),
            Some(persister),
            OrchestratorConfig::default(),
        ));
        Harness {
            orchestrator,
            store,
            provider,
            tool_completed,
        }
    }

    fn session() -> ConversationSession {
        ConversationSession::new(
            TenantId::from("ten-1"),
            UserId::from("user-1"),
            ModelParams::default(),
        )
    }

    #[tokio::test]
    async fn full_loop_streams_events_and_persists_transcript() {
        let harness = harness(vec![tool_turn("req-1"), final_turn()], Duration::ZERO);
        let session = session();
        let session_id = session.session_id.clone();

        let mut stream = harness
            .orchestrator
            .run(session, "find 500k recent shoppers".into())
            .unwrap();

        let mut types = Vec::new();
        let mut end = None;
        while let Some(event) = stream.next().await {
            types.push(event.event_type());
            if let StreamEvent::SessionEnded {
                total_iterations,
                session_id,
            } = event
            {
                end = Some((total_iterations, session_id));
            }
        }
        assert_eq!(
            types,
            vec![
                "content_delta",
                "tool_use",
                "tool_result",
                "content_delta",
                "final_response",
                "end",
            ]
        );
        let (total_iterations, ended_session) = end.unwrap();
        assert_eq!(total_iterations, 2);
        assert_eq!(ended_session, session_id.as_str());

        // transcript: user, assistant, tool outcomes, final assistant
        let record = harness.store.get_session(&session_id).unwrap();
        assert_eq!(record.status, "completed");
        assert_eq!(record.message_count, 4);
        assert_eq!(record.input_tokens, 30);
        assert_eq!(record.output_tokens, 12);

        let messages = harness.store.get_messages(&session_id).unwrap();
        assert_eq!(messages.len(), 4);
        assert!(messages[2].blocks[0].is_tool_outcome());

        let audit = harness.store.tool_invocations(&session_id).unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].record.tool_name, "echo");
        assert!(audit[0].record.result.is_some());
        assert_eq!(harness.orchestrator.sessions().active_count(), 0);
    }

    #[tokio::test]
    async fn session_seeded_with_client_history_is_still_persisted() {
        let harness = harness(vec![final_turn()], Duration::ZERO);
        let mut session = session();
        // clients that keep history locally hand it over on the first turn
        session.append(Message::user_text("earlier question"));
        session.append(Message::assistant(vec![ContentBlock::text(
            "earlier answer",
        )]));
        let session_id = session.session_id.clone();

        let mut stream = harness
            .orchestrator
            .run(session, "now build the audience".into())
            .unwrap();
        while stream.next().await.is_some() {}

        // the session id handed back in `end` must be resumable
        let record = harness.store.get_session(&session_id).unwrap();
        assert_eq!(record.status, "completed");
        assert_eq!(record.input_tokens, 20);
        assert_eq!(record.output_tokens, 7);

        // seeded history lives in memory only; this turn's messages land
        let messages = harness.store.get_messages(&session_id).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[0].blocks[0].as_text(),
            Some("now build the audience")
        );
    }

    #[tokio::test]
    async fn model_failure_emits_single_error_event() {
        let harness = harness(Vec::new(), Duration::ZERO);
        let session = session();
        let session_id = session.session_id.clone();

        let mut stream = harness
            .orchestrator
            .run(session, "anything".into())
            .unwrap();

        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event);
        }
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], StreamEvent::ErrorOccurred { .. }));

        // give the spawned task time to finish bookkeeping
        tokio::time::sleep(Duration::from_millis(50)).await;
        let record = harness.store.get_session(&session_id).unwrap();
        assert_eq!(record.status, "active", "failed session stays incomplete");
        assert_eq!(harness.orchestrator.sessions().active_count(), 0);
    }

    #[tokio::test]
    async fn iteration_ceiling_ends_without_final_response() {
        let harness = harness(
            vec![tool_turn("req-1"), tool_turn("req-2"), tool_turn("req-3")],
            Duration::ZERO,
        );
        let mut session = session();
        session.params.max_iterations = 2;
        let session_id = session.session_id.clone();

        let mut stream = harness
            .orchestrator
            .run(session, "keep going".into())
            .unwrap();

        let mut types = Vec::new();
        while let Some(event) = stream.next().await {
            types.push(event.event_type());
        }
        assert!(!types.contains(&"final_response"));
        assert_eq!(*types.last().unwrap(), "end");
        assert_eq!(harness.provider.calls.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let record = harness.store.get_session(&session_id).unwrap();
        assert_eq!(record.status, "completed");
    }

    #[tokio::test]
    async fn concurrent_turn_on_same_session_is_rejected() {
        let harness = harness(
            vec![tool_turn("req-1"), final_turn()],
            Duration::from_millis(200),
        );
        let session = session();

        let stream = harness
            .orchestrator
            .run(session.clone(), "first".into())
            .unwrap();
        let err = harness
            .orchestrator
            .run(session, "second".into())
            .unwrap_err();
        assert!(matches!(err, crate::errors::RuntimeError::SessionBusy(_)));
        drop(stream);
    }

    #[tokio::test]
    async fn disconnect_lets_inflight_tool_finish_but_stops_iterating() {
        let harness = harness(
            vec![tool_turn("req-1"), final_turn()],
            Duration::from_millis(100),
        );
        let session = session();
        let session_id = session.session_id.clone();

        let mut stream = harness
            .orchestrator
            .run(session, "find shoppers".into())
            .unwrap();

        // read until the tool is dispatched, then walk away
        while let Some(event) = stream.next().await {
            if matches!(event, StreamEvent::ToolStarted { .. }) {
                break;
            }
        }
        drop(stream);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(
            harness.tool_completed.load(Ordering::SeqCst),
            "in-flight tool runs to completion"
        );
        assert_eq!(
            harness.provider.calls.load(Ordering::SeqCst),
            1,
            "no further model iteration after disconnect"
        );
        let record = harness.store.get_session(&session_id).unwrap();
        assert_eq!(record.status, "active", "cancelled session stays incomplete");
        assert_eq!(harness.orchestrator.sessions().active_count(), 0);
    }
}
