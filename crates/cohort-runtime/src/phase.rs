//! Heuristic phase and exploration classification of streamed text.
//!
//! Pure, best-effort UX sugar. The labels computed here decorate
//! `content_delta` events so clients can show progress; no correctness
//! logic (termination, tool pairing) may depend on them. Matching is
//! substring-based and deliberately loose.

use cohort_core::events::Phase;

/// First-person planning phrases that mark text as exploratory.
const EXPLORATORY_MARKERS: &[&str] = &[
    "let me",
    "i'll check",
    "i'll start",
    "i'll look",
    "i need to",
    "checking",
    "first, i",
    "let's see",
    "let's look",
];

/// Section markers and concluding phrases that mark text as a final answer.
const FINAL_MARKERS: &[&str] = &[
    "## ",
    "### ",
    "in summary",
    "to summarize",
    "final audience",
    "final result",
    "here is the audience",
    "here's the audience",
    "the audience segment",
];

/// Whether the accumulated text reads as exploratory planning.
#[must_use]
pub fn is_exploratory(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    EXPLORATORY_MARKERS.iter().any(|m| lower.contains(m))
}

/// Whether the accumulated text reads as a final answer.
#[must_use]
pub fn is_final_marker(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    FINAL_MARKERS.iter().any(|m| lower.contains(m))
}

/// Tracks the coarse phase label across a turn's iterations.
///
/// The phase only ever advances: `exploring` → `analyzing` →
/// `finalizing`. A final marker jumps straight to `finalizing`;
/// otherwise the label settles forward as non-exploratory iterations
/// accumulate.
#[derive(Clone, Debug)]
pub struct PhaseTracker {
    phase: Phase,
    non_exploratory_iterations: u32,
    finalize_after: u32,
}

impl PhaseTracker {
    /// Create a tracker that settles into `finalizing` after the given
    /// number of non-exploratory iterations.
    #[must_use]
    pub fn new(finalize_after: u32) -> Self {
        Self {
            phase: Phase::Exploring,
            non_exploratory_iterations: 0,
            finalize_after: finalize_after.max(1),
        }
    }

    /// Current phase label.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Classify the running text accumulation, advancing the phase if a
    /// final marker is present. Returns `(is_exploration, is_final_result)`.
    pub fn observe(&mut self, accumulated: &str) -> (bool, bool) {
        let exploratory = is_exploratory(accumulated);
        let final_result = is_final_marker(accumulated);
        if final_result {
            self.phase = self.phase.advance_to(Phase::Finalizing);
        }
        (exploratory, final_result)
    }

    /// Record the end of one model iteration.
    pub fn end_iteration(&mut self, exploratory: bool) {
        if exploratory {
            return;
        }
        self.non_exploratory_iterations += 1;
        if self.non_exploratory_iterations >= self.finalize_after {
            self.phase = self.phase.advance_to(Phase::Finalizing);
        } else {
            self.phase = self.phase.advance_to(Phase::Analyzing);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exploratory_markers_detected() {
        assert!(is_exploratory("Let me check the schema first"));
        assert!(is_exploratory("I need to see the age distribution"));
        assert!(!is_exploratory("The audience contains 500,000 shoppers"));
    }

    #[test]
    fn final_markers_detected() {
        assert!(is_final_marker("## Audience Summary\n\n500k shoppers"));
        assert!(is_final_marker("In summary, the cohort matches"));
        assert!(!is_final_marker("running another query now"));
    }

    #[test]
    fn final_marker_jumps_to_finalizing() {
        let mut tracker = PhaseTracker::new(3);
        assert_eq!(tracker.phase(), Phase::Exploring);
        let (_, final_result) = tracker.observe("## Final Audience");
        assert!(final_result);
        assert_eq!(tracker.phase(), Phase::Finalizing);
    }

    #[test]
    fn phase_never_moves_backward() {
        let mut tracker = PhaseTracker::new(3);
        let _ = tracker.observe("## done");
        assert_eq!(tracker.phase(), Phase::Finalizing);
        let _ = tracker.observe("let me check something else");
        assert_eq!(tracker.phase(), Phase::Finalizing);
    }

    #[test]
    fn non_exploratory_iterations_settle_forward() {
        let mut tracker = PhaseTracker::new(2);
        tracker.end_iteration(true);
        assert_eq!(tracker.phase(), Phase::Exploring);
        tracker.end_iteration(false);
        assert_eq!(tracker.phase(), Phase::Analyzing);
        tracker.end_iteration(false);
        assert_eq!(tracker.phase(), Phase::Finalizing);
    }
}
