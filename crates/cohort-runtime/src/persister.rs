//! Best-effort transcript persistence.
//!
//! The live conversation never depends on the audit trail succeeding: a
//! failed write is logged and swallowed. Store calls are synchronous
//! `SQLite` work, so they run on the blocking pool.

use std::sync::Arc;

use tracing::warn;

use cohort_core::ids::SessionId;
use cohort_core::messages::{ConversationSession, Message};
use cohort_transcripts::{TranscriptStore, TurnMeta};

/// Fire-and-forget wrapper over the transcript store.
#[derive(Clone)]
pub struct TranscriptPersister {
    store: Arc<TranscriptStore>,
    workflow: String,
}

impl TranscriptPersister {
    /// Wrap a store, tagging every session with the given workflow.
    #[must_use]
    pub fn new(store: Arc<TranscriptStore>, workflow: impl Into<String>) -> Self {
        Self {
            store,
            workflow: workflow.into(),
        }
    }

    /// Ensure the session row exists. Safe to call at the start of every
    /// turn; the store ignores an already-present row.
    pub async fn record_session(&self, session: &ConversationSession) {
        let store = Arc::clone(&self.store);
        let session = session.clone();
        let workflow = self.workflow.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            store.create_session(&session, &workflow)
        })
        .await;
        if let Ok(Err(e)) = outcome {
            warn!(error = %e, "failed to persist session, continuing");
        }
    }

    /// Persist one appended message with its turn metadata.
    pub async fn record_message(&self, session_id: &SessionId, message: &Message, meta: TurnMeta) {
        let store = Arc::clone(&self.store);
        let session_id = session_id.clone();
        let message = message.clone();
        let outcome =
            tokio::task::spawn_blocking(move || store.append_message(&session_id, &message, &meta))
                .await;
        if let Ok(Err(e)) = outcome {
            warn!(error = %e, "failed to persist message, continuing");
        }
    }

    /// Mark a session completed.
    pub async fn record_completion(&self, session_id: &SessionId) {
        let store = Arc::clone(&self.store);
        let session_id = session_id.clone();
        let outcome =
            tokio::task::spawn_blocking(move || store.complete_session(&session_id)).await;
        if let Ok(Err(e)) = outcome {
            warn!(error = %e, "failed to mark session completed, continuing");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    use cohort_core::ids::{TenantId, UserId};
    use cohort_core::messages::ModelParams;
    use cohort_transcripts::connection::{ConnectionConfig, new_in_memory};

    fn persister() -> TranscriptPersister {
        let pool = new_in_memory(&ConnectionConfig::default()).unwrap();
        let store = TranscriptStore::new(pool).unwrap();
        TranscriptPersister::new(Arc::new(store), "audience_builder")
    }

    #[tokio::test]
    async fn writes_land_when_store_is_healthy() {
        let persister = persister();
        let session = ConversationSession::new(
            TenantId::from("ten-1"),
            UserId::from("user-1"),
            ModelParams::default(),
        );
        persister.record_session(&session).await;
        persister
            .record_message(
                &session.session_id,
                &Message::user_text("hello"),
                TurnMeta::default(),
            )
            .await;
        persister.record_completion(&session.session_id).await;

        let record = persister.store.get_session(&session.session_id).unwrap();
        assert_eq!(record.status, "completed");
        assert_eq!(record.message_count, 1);
    }

    #[tokio::test]
    async fn failures_are_swallowed() {
        let persister = persister();
        // appending to a session that was never created fails inside the
        // store but must not propagate
        persister
            .record_message(
                &SessionId::from("ghost"),
                &Message::user_text("hello"),
                TurnMeta::default(),
            )
            .await;
        persister.record_completion(&SessionId::from("ghost")).await;
    }
}
