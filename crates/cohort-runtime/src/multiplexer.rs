//! Per-session ordered event channel.
//!
//! One multiplexer exists per running turn. The orchestrator pushes
//! [`StreamEvent`]s in production order; the single consumer reads them
//! off a [`SessionStream`]. Guarantees enforced here:
//!
//! - events arrive in the exact order emitted;
//! - a `tool_result` is never delivered without a prior `tool_use` for
//!   the same request id;
//! - the channel closes exactly once, after a terminal event;
//! - consumer disconnect cancels the session's [`CancellationToken`] so
//!   the orchestrator stops starting new model iterations.

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use cohort_core::events::StreamEvent;
use cohort_core::ids::SessionId;

/// Create a connected multiplexer/stream pair for one session turn.
#[must_use]
pub fn channel(session_id: SessionId, capacity: usize) -> (EventMultiplexer, SessionStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let cancel = CancellationToken::new();
    let multiplexer = EventMultiplexer {
        session_id,
        tx,
        cancel: cancel.clone(),
        started: Mutex::new(HashSet::new()),
        closed: AtomicBool::new(false),
    };
    let stream = SessionStream {
        inner: ReceiverStream::new(rx),
        cancel,
    };
    (multiplexer, stream)
}

/// Producer half: serializes orchestrator events onto the channel.
pub struct EventMultiplexer {
    session_id: SessionId,
    tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
    started: Mutex<HashSet<String>>,
    closed: AtomicBool,
}

impl EventMultiplexer {
    /// Cancellation token tripped when the consumer disconnects.
    #[must_use]
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the channel has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Push an event onto the channel.
    ///
    /// A terminal event closes the channel; anything emitted after that
    /// is dropped. Returns whether the event was delivered.
    pub async fn emit(&self, event: StreamEvent) -> bool {
        if self.is_closed() {
            warn!(
                session_id = self.session_id.as_str(),
                event = event.event_type(),
                "event after channel close, dropping"
            );
            return false;
        }

        if let StreamEvent::ToolStarted { tool_id, .. } = &event {
            let _ = self.started.lock().insert(tool_id.clone());
        }

        let terminal = event.is_terminal();
        let delivered = self.tx.send(event).await.is_ok();
        if !delivered {
            // Consumer is gone: stop the loop, no further events can land.
            debug!(
                session_id = self.session_id.as_str(),
                "consumer disconnected, cancelling session"
            );
            self.closed.store(true, Ordering::SeqCst);
            self.cancel.cancel();
        } else if terminal {
            self.closed.store(true, Ordering::SeqCst);
        }
        delivered
    }

    /// Push a `tool_result` event, enforcing started/finished pairing.
    ///
    /// If no `tool_use` was emitted for `tool_id`, the event is dropped.
    pub async fn emit_tool_finished(&self, tool_id: &str, event: StreamEvent) -> bool {
        if !self.started.lock().contains(tool_id) {
            warn!(
                session_id = self.session_id.as_str(),
                tool_id, "tool_result without matching tool_use, dropping"
            );
            return false;
        }
        self.emit(event).await
    }
}

/// Consumer half: the ordered event stream handed to the client.
///
/// Dropping the stream signals cancellation to the orchestrator.
#[derive(Debug)]
pub struct SessionStream {
    inner: ReceiverStream<StreamEvent>,
    cancel: CancellationToken,
}

impl Stream for SessionStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl Drop for SessionStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
