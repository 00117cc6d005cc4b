//! Context-pruning policy for long sessions.
//!
//! Schema dumps and query result payloads dominate context growth. Above
//! a trigger size, older tool-outcome content is elided from the history
//! sent to the model while the most recent outcomes — the ones still
//! informing the model's next decision — are kept intact. The in-memory
//! session and the transcript are never pruned; only the per-invocation
//! request history is.

use serde_json::Value;

use cohort_core::content::ContentBlock;
use cohort_core::messages::Message;

/// Placeholder substituted for an elided tool outcome.
const ELIDED_CONTENT: &str = "[older tool output elided to conserve context]";

/// Policy for eliding older tool-outcome content.
#[derive(Clone, Debug)]
pub struct PruningPolicy {
    /// Total block count above which pruning kicks in.
    pub trigger_blocks: usize,
    /// Number of most-recent tool outcomes always kept intact.
    pub keep_recent: usize,
    /// Tool names whose outcomes are never elided.
    pub exempt_tools: Vec<String>,
}

impl Default for PruningPolicy {
    fn default() -> Self {
        Self {
            trigger_blocks: 40,
            keep_recent: 3,
            exempt_tools: vec!["audience_memory".to_owned()],
        }
    }
}

impl PruningPolicy {
    /// Produce the history to send to the model.
    ///
    /// Below the trigger this is a plain copy. Above it, every tool
    /// outcome except the most recent `keep_recent` and those produced by
    /// exempt tools has its content replaced with a short placeholder.
    #[must_use]
    pub fn prune(&self, messages: &[Message]) -> Vec<Message> {
        let total_blocks: usize = messages.iter().map(|m| m.blocks.len()).sum();
        if total_blocks <= self.trigger_blocks {
            return messages.to_vec();
        }

        // Map request id -> tool name, so outcomes can be matched to the
        // tool that produced them.
        let mut tool_names: Vec<(String, String)> = Vec::new();
        for message in messages {
            for block in &message.blocks {
                if let ContentBlock::ToolRequest { id, name, .. } = block {
                    tool_names.push((id.clone(), name.clone()));
                }
            }
        }
        let name_of = |request_id: &str| -> Option<&str> {
            tool_names
                .iter()
                .find(|(id, _)| id == request_id)
                .map(|(_, name)| name.as_str())
        };

        let outcome_count = messages
            .iter()
            .flat_map(|m| &m.blocks)
            .filter(|b| b.is_tool_outcome())
            .count();
        let elide_before = outcome_count.saturating_sub(self.keep_recent);

        let mut seen = 0usize;
        messages
            .iter()
            .map(|message| {
                let blocks = message
                    .blocks
                    .iter()
                    .map(|block| match block {
                        ContentBlock::ToolOutcome {
                            request_id,
                            is_error,
                            ..
                        } => {
                            let index = seen;
                            seen += 1;
                            let exempt = name_of(request_id)
                                .is_some_and(|n| self.exempt_tools.iter().any(|e| e == n));
                            if index < elide_before && !exempt {
                                ContentBlock::ToolOutcome {
                                    request_id: request_id.clone(),
                                    content: Value::String(ELIDED_CONTENT.to_owned()),
                                    is_error: *is_error,
                                }
                            } else {
                                block.clone()
                            }
                        }
                        other => other.clone(),
                    })
                    .collect();
                Message {
                    role: message.role,
                    blocks,
                    timestamp: message.timestamp,
                }
            })
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
