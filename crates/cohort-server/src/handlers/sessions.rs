//! Session read endpoints.
//!
//! Both endpoints are tenant-scoped: the resolved tenant bounds every
//! store query, and a session belonging to another tenant reads as
//! absent.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::task;

use cohort_core::ids::{SessionId, UserId};
use cohort_transcripts::errors::TranscriptError;
use cohort_transcripts::store::ListSessionsOptions;

use crate::errors::ApiError;
use crate::server::AppState;

/// Query parameters for session listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    /// User whose sessions to list. Defaults to `anonymous`.
    #[serde(default = "default_user")]
    pub user_id: String,
    /// Restrict to one workflow tag.
    pub workflow: Option<String>,
    /// Page size.
    pub limit: Option<u32>,
    /// Results to skip.
    pub offset: Option<u32>,
}

fn default_user() -> String {
    "anonymous".into()
}

/// List a user's sessions, newest first.
pub async fn list_sessions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, ApiError> {
    let tenant = state.resolver.resolve(&headers).await?;
    let defaults = ListSessionsOptions::default();
    let options = ListSessionsOptions {
        workflow: params.workflow,
        limit: params.limit.unwrap_or(defaults.limit),
        offset: params.offset.unwrap_or(defaults.offset),
    };
    let store = Arc::clone(&state.store);
    let tenant_id = tenant.tenant_id;
    let user_id = UserId::from_string(params.user_id);
    let records = task::spawn_blocking(move || store.list_sessions(&tenant_id, &user_id, &options))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    Ok(Json(json!({ "sessions": records })))
}

/// Fetch one session's record and full transcript.
pub async fn get_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let tenant = state.resolver.resolve(&headers).await?;
    let store = Arc::clone(&state.store);
    let lookup = SessionId::from_string(session_id.clone());
    let (record, messages, invocations) = task::spawn_blocking(move || {
        let record = store.get_session(&lookup)?;
        let messages = store.get_messages(&lookup)?;
        let invocations = store.tool_invocations(&lookup)?;
        Ok::<_, TranscriptError>((record, messages, invocations))
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    if record.tenant_id != tenant.tenant_id.as_str() {
        return Err(ApiError::NotFound(session_id));
    }
    Ok(Json(json!({
        "session": record,
        "messages": messages,
        "toolInvocations": invocations,
    })))
}
