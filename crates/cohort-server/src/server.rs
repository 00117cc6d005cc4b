//! Router assembly and server lifecycle.
//!
//! The server is wired from external collaborators: a model provider, an
//! analytics data source, and a tenant resolver. Everything else (store,
//! tool registry, orchestrator) is built here from configuration.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use cohort_llm::provider::ModelProvider;
use cohort_runtime::{
    ConversationOrchestrator, OrchestratorConfig, PruningPolicy, TranscriptPersister,
};
use cohort_tools::memory::{MemoryLimits, MemoryTool};
use cohort_tools::query::QueryTool;
use cohort_tools::schema::SchemaTool;
use cohort_tools::{AnalyticsOps, ToolRegistry};
use cohort_transcripts::connection::{ConnectionConfig, new_file};
use cohort_transcripts::store::TranscriptStore;

use crate::config::ServerConfig;
use crate::handlers;
use crate::tenancy::TenantResolver;

/// Shared application state, cloned per request.
#[derive(Clone)]
pub struct AppState {
    /// Drives conversational turns.
    pub orchestrator: Arc<ConversationOrchestrator>,
    /// Transcript reads for the session endpoints.
    pub store: Arc<TranscriptStore>,
    /// Request-to-tenant resolution.
    pub resolver: Arc<dyn TenantResolver>,
    /// Loaded configuration.
    pub config: Arc<ServerConfig>,
}

/// Assemble application state from configuration and collaborators.
pub fn build_state(
    provider: Arc<dyn ModelProvider>,
    analytics: Arc<dyn AnalyticsOps>,
    resolver: Arc<dyn TenantResolver>,
    config: ServerConfig,
) -> anyhow::Result<AppState> {
    let pool = new_file(&config.database_path, &ConnectionConfig::default())?;
    let store = Arc::new(TranscriptStore::new(pool)?);
    let persister = TranscriptPersister::new(Arc::clone(&store), config.workflow.clone());

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(SchemaTool::new(Arc::clone(&analytics))));
    registry.register(Arc::new(QueryTool::new(analytics)));
    registry.register(Arc::new(MemoryTool::new(
        &config.memory_root,
        MemoryLimits {
            max_file_bytes: config.memory_max_file_bytes,
            max_total_bytes: config.memory_max_total_bytes,
        },
    )));

    let orchestrator_config = OrchestratorConfig {
        pruning: PruningPolicy {
            trigger_blocks: config.pruning_trigger_blocks,
            keep_recent: config.pruning_keep_recent,
            ..PruningPolicy::default()
        },
        ..OrchestratorConfig::default()
    };
    let orchestrator = Arc::new(ConversationOrchestrator::new(
        provider,
        Arc::new(registry),
        Some(persister),
        orchestrator_config,
    ));

    Ok(AppState {
        orchestrator,
        store,
        resolver,
        config: Arc::new(config),
    })
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/audience/turn", post(handlers::turn::handle_turn))
        .route(
            "/v1/audience/sessions",
            get(handlers::sessions::list_sessions),
        )
        .route(
            "/v1/audience/sessions/{session_id}",
            get(handlers::sessions::get_session),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and run the server until shutdown.
pub async fn serve(state: AppState, config: &ServerConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use cohort_core::ids::TenantId;
    use cohort_llm::events::{ModelEvent, StopReason, TokenUsage};
    use cohort_llm::provider::{ModelEventStream, ModelRequest, ModelResult, ModelStreamOptions};
    use cohort_tools::errors::ToolError;
    use cohort_tools::traits::QueryOutput;
    use cohort_transcripts::connection::new_in_memory;

    use crate::tenancy::StaticTenantResolver;

    struct FinalProvider;

    #[async_trait]
    impl ModelProvider for FinalProvider {
        fn model(&self) -> &str {
            "test-model"
        }

        async fn stream(
            &self,
            _request: &ModelRequest,
            _options: &ModelStreamOptions,
        ) -> ModelResult<ModelEventStream> {
            Ok(Box::pin(async_stream::stream! {
                yield Ok(ModelEvent::TextDelta {
                    text: "## Audience ready".into(),
                });
                yield Ok(ModelEvent::Done {
                    stop_reason: StopReason::EndTurn,
                    usage: TokenUsage {
                        input_tokens: 10,
                        output_tokens: 5,
                    },
                });
            }))
        }
    }

    struct StubAnalytics;

    #[async_trait]
    impl cohort_tools::AnalyticsOps for StubAnalytics {
        async fn discover_schema(&self, _tenant_id: &TenantId) -> Result<Value, ToolError> {
            Ok(json!({ "tables": [] }))
        }

        async fn run_query(
            &self,
            _tenant_id: &TenantId,
            _sql: &str,
        ) -> Result<QueryOutput, ToolError> {
            Ok(QueryOutput {
                columns: vec!["count".into()],
                rows: vec![vec![json!(42)]],
                row_count: 1,
                breakdown: None,
                total_population: None,
            })
        }
    }

    fn test_state() -> AppState {
        let pool = new_in_memory(&ConnectionConfig::default()).unwrap();
        let store = Arc::new(TranscriptStore::new(pool).unwrap());
        let persister = TranscriptPersister::new(Arc::clone(&store), "audience_builder");

        let analytics: Arc<dyn AnalyticsOps> = Arc::new(StubAnalytics);
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(SchemaTool::new(Arc::clone(&analytics))));
        registry.register(Arc::new(QueryTool::new(analytics)));

        let orchestrator = Arc::new(ConversationOrchestrator::new(
            Arc::new(FinalProvider),
            Arc::new(registry),
            Some(persister),
            OrchestratorConfig::default(),
        ));
        let resolver = Arc::new(StaticTenantResolver::new().with_key("key-1", TenantId::from("ten-1")));
        AppState {
            orchestrator,
            store,
            resolver,
            config: Arc::new(ServerConfig::default()),
        }
    }

    fn turn_request(body: &str, api_key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/v1/audience/turn")
            .header("content-type", "application/json");
        if let Some(key) = api_key {
            builder = builder.header("x-api-key", key);
        }
        builder.body(Body::from(body.to_owned())).unwrap()
    }

    #[tokio::test]
    async fn health_responds_ok() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn turn_without_api_key_is_unauthorized() {
        let app = router(test_state());
        let response = app
            .oneshot(turn_request(r#"{"query":"find shoppers"}"#, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let app = router(test_state());
        let response = app
            .oneshot(turn_request(r#"{"query":"   "}"#, Some("key-1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let app = router(test_state());
        let response = app
            .oneshot(turn_request(
                r#"{"query":"resume","sessionId":"missing"}"#,
                Some("key-1"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn turn_streams_events_and_persists_session() {
        let state = test_state();
        let app = router(state.clone());

        let response = app
            .oneshot(turn_request(
                r#"{"query":"build a high-value audience"}"#,
                Some("key-1"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Draining the body waits for the terminal event, by which point
        // the completion has been recorded.
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("content_delta"));
        assert!(text.contains("final_response"));
        assert!(text.contains("\"end\""));

        let list = router(state)
            .oneshot(
                Request::builder()
                    .uri("/v1/audience/sessions?userId=anonymous")
                    .header("x-api-key", "key-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(list.status(), StatusCode::OK);
        let body = to_bytes(list.into_body(), usize::MAX).await.unwrap();
        let parsed: Value = serde_json::from_slice(&body).unwrap();
        let sessions = parsed["sessions"].as_array().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0]["status"], "completed");
    }

    #[tokio::test]
    async fn sessions_are_tenant_scoped() {
        let state = test_state();
        let resolver = StaticTenantResolver::new()
            .with_key("key-1", TenantId::from("ten-1"))
            .with_key("key-2", TenantId::from("ten-2"));
        let state = AppState {
            resolver: Arc::new(resolver),
            ..state
        };
        let app = router(state.clone());

        let response = app
            .oneshot(turn_request(r#"{"query":"build it"}"#, Some("key-1")))
            .await
            .unwrap();
        let _ = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        let list = router(state)
            .oneshot(
                Request::builder()
                    .uri("/v1/audience/sessions?userId=anonymous")
                    .header("x-api-key", "key-2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = to_bytes(list.into_body(), usize::MAX).await.unwrap();
        let parsed: Value = serde_json::from_slice(&body).unwrap();
        assert!(parsed["sessions"].as_array().unwrap().is_empty());
    }
}
