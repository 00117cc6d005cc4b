//! Conversational turn endpoint.
//!
//! `POST /v1/audience/turn` starts (or resumes) a session, runs one
//! orchestrated user turn, and streams the resulting events back as SSE.
//! The response stream ends when the turn's terminal event is emitted;
//! dropping the connection cancels the turn cooperatively.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use tokio::task;
use tracing::instrument;

use cohort_core::content::ContentBlock;
use cohort_core::ids::{SessionId, UserId};
use cohort_core::messages::{
    ConversationSession, Message, ModelParams, SessionStatus, TokenCounters,
};
use cohort_transcripts::errors::TranscriptError;

use crate::errors::ApiError;
use crate::server::AppState;
use crate::tenancy::TenantContext;
use crate::validation::{TurnRequest, validate_turn_request};

/// Run one conversational turn and stream its events.
#[instrument(skip_all, fields(session_id = request.session_id.as_deref().unwrap_or("new")))]
pub async fn handle_turn(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<TurnRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    validate_turn_request(&request)?;
    let tenant = state.resolver.resolve(&headers).await?;
    let session = resolve_session(&state, &tenant, &request).await?;
    let stream = state.orchestrator.run(session, request.query)?;
    let events = stream.map(|event| Event::default().json_data(&event));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Reload an existing session from the transcript store, or seed a new
/// one from the request.
///
/// Client-supplied history on a brand-new session lives in memory only;
/// the store starts recording at the first orchestrated turn.
async fn resolve_session(
    state: &AppState,
    tenant: &TenantContext,
    request: &TurnRequest,
) -> Result<ConversationSession, ApiError> {
    let params = ModelParams {
        model: state.config.model.clone(),
        temperature: state.config.temperature,
        max_tokens: state.config.max_tokens,
        max_iterations: state.config.max_iterations,
    };

    let Some(id) = &request.session_id else {
        let user_id = UserId::from_string(
            request
                .user_id
                .clone()
                .unwrap_or_else(|| "anonymous".into()),
        );
        let mut session = ConversationSession::new(tenant.tenant_id.clone(), user_id, params);
        for inbound in &request.messages {
            let message = if inbound.role == "assistant" {
                Message::assistant(vec![ContentBlock::text(inbound.content.clone())])
            } else {
                Message::user_text(inbound.content.clone())
            };
            session.append(message);
        }
        return Ok(session);
    };

    let session_id = SessionId::from_string(id.clone());
    let store = Arc::clone(&state.store);
    let lookup = session_id.clone();
    let (record, messages) = task::spawn_blocking(move || {
        let record = store.get_session(&lookup)?;
        let messages = store.get_messages(&lookup)?;
        Ok::<_, TranscriptError>((record, messages))
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    // Cross-tenant lookups read as absence, not as a permission failure.
    if record.tenant_id != tenant.tenant_id.as_str() {
        return Err(ApiError::NotFound(id.clone()));
    }
    if record.status == "completed" {
        return Err(ApiError::Validation(format!(
            "session {id} is already completed"
        )));
    }

    let created_at = DateTime::parse_from_rfc3339(&record.created_at)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    Ok(ConversationSession {
        session_id,
        tenant_id: tenant.tenant_id.clone(),
        user_id: UserId::from_string(record.user_id),
        messages,
        params: ModelParams {
            model: record.model,
            ..params
        },
        tokens: TokenCounters {
            input_tokens: record.input_tokens,
            output_tokens: record.output_tokens,
        },
        status: SessionStatus::Active,
        created_at,
        updated_at: Utc::now(),
    })
}
