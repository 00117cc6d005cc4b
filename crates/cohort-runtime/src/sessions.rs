//! Active-session tracking.
//!
//! One turn per session at a time. Independent sessions run fully
//! concurrently; the registry only tracks which sessions currently have
//! a loop in flight, and lets callers abort one cooperatively.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use cohort_core::ids::SessionId;

use crate::errors::{Result, RuntimeError};

/// Tracks which sessions have a running turn.
#[derive(Default)]
pub struct SessionRegistry {
    active: Mutex<HashMap<String, CancellationToken>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a running turn. Fails if one is already in flight.
    pub fn begin(&self, session_id: &SessionId, cancel: CancellationToken) -> Result<()> {
        let mut active = self.active.lock();
        if active.contains_key(session_id.as_str()) {
            return Err(RuntimeError::SessionBusy(session_id.as_str().to_owned()));
        }
        let _ = active.insert(session_id.as_str().to_owned(), cancel);
        debug!(session_id = session_id.as_str(), "turn started");
        Ok(())
    }

    /// Remove a session's running turn.
    pub fn finish(&self, session_id: &SessionId) {
        let _ = self.active.lock().remove(session_id.as_str());
        debug!(session_id = session_id.as_str(), "turn finished");
    }

    /// Cooperatively abort a session's running turn, if any.
    pub fn abort(&self, session_id: &SessionId) -> bool {
        if let Some(cancel) = self.active.lock().get(session_id.as_str()) {
            cancel.cancel();
            true
        } else {
            false
        }
    }

    /// Number of sessions with a turn in flight.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
