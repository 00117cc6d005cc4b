//! Content block types.
//!
//! These are the primitive building blocks that appear inside messages.
//! A model turn produces an ordered sequence of blocks: free text, tool
//! requests, and (for server-fulfilled tools) tool outcomes delivered in
//! the same turn. Locally executed tools produce their outcome blocks in
//! the follow-up user message.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single content block within a message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    /// Free-form text produced by the model or the user.
    #[serde(rename = "text")]
    Text {
        /// The text content.
        text: String,
    },

    /// A structured call to an external capability, issued by the model.
    #[serde(rename = "tool_request")]
    ToolRequest {
        /// Unique request ID within the session.
        id: String,
        /// Tool name.
        name: String,
        /// Tool input (JSON object).
        input: Map<String, Value>,
        /// Whether the model-service provider fulfils this request itself.
        /// Server tools are never dispatched locally; their outcome arrives
        /// as a separate block later in the same model turn.
        #[serde(rename = "serverTool", default, skip_serializing_if = "std::ops::Not::not")]
        server_tool: bool,
    },

    /// The value returned to the model in response to a tool request.
    #[serde(rename = "tool_outcome")]
    ToolOutcome {
        /// ID of the tool request this outcome answers.
        #[serde(rename = "requestId")]
        request_id: String,
        /// Outcome content (JSON — structured payload or plain string).
        content: Value,
        /// Whether the execution resulted in an error.
        #[serde(rename = "isError", default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

impl ContentBlock {
    /// Create a text block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create a locally-executed tool request block.
    #[must_use]
    pub fn tool_request(
        id: impl Into<String>,
        name: impl Into<String>,
        input: Map<String, Value>,
    ) -> Self {
        Self::ToolRequest {
            id: id.into(),
            name: name.into(),
            input,
            server_tool: false,
        }
    }

    /// Create a successful tool outcome block.
    #[must_use]
    pub fn tool_outcome(request_id: impl Into<String>, content: Value) -> Self {
        Self::ToolOutcome {
            request_id: request_id.into(),
            content,
            is_error: false,
        }
    }

    /// Create an error tool outcome block.
    #[must_use]
    pub fn tool_error(request_id: impl Into<String>, content: Value) -> Self {
        Self::ToolOutcome {
            request_id: request_id.into(),
            content,
            is_error: true,
        }
    }

    /// Returns `true` if this is a text block.
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text { .. })
    }

    /// Returns `true` if this is a tool request block.
    #[must_use]
    pub fn is_tool_request(&self) -> bool {
        matches!(self, Self::ToolRequest { .. })
    }

    /// Returns `true` if this is a tool outcome block.
    #[must_use]
    pub fn is_tool_outcome(&self) -> bool {
        matches!(self, Self::ToolOutcome { .. })
    }

    /// Returns the text if this is a text block, `None` otherwise.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Extract and join the text portions of a block sequence.
pub fn extract_text(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .filter_map(ContentBlock::as_text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Count the text blocks in a block sequence.
#[must_use]
pub fn text_block_count(blocks: &[ContentBlock]) -> usize {
    blocks.iter().filter(|b| b.is_text()).count()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_block_serde_roundtrip() {
        let block = ContentBlock::text("hello");
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json, json!({"type": "text", "text": "hello"}));
        let back: ContentBlock = serde_json::from_value(json).unwrap();
        assert_eq!(back, block);
    }

    #[test]
    fn tool_request_serde_roundtrip() {
        let mut input = Map::new();
        let _ = input.insert("sql".into(), json!("SELECT COUNT(*) FROM shoppers"));
        let block = ContentBlock::tool_request("req-1", "run_audience_query", input);
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "tool_request");
        assert_eq!(json["name"], "run_audience_query");
        assert!(json.get("serverTool").is_none(), "false flag is omitted");
        let back: ContentBlock = serde_json::from_value(json).unwrap();
        assert_eq!(back, block);
    }

    #[test]
    fn server_tool_flag_serialized_when_set() {
        let block = ContentBlock::ToolRequest {
            id: "req-2".into(),
            name: "web_search".into(),
            input: Map::new(),
            server_tool: true,
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["serverTool"], true);
    }

    #[test]
    fn tool_outcome_success() {
        let block = ContentBlock::tool_outcome("req-1", json!({"rowCount": 12}));
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["requestId"], "req-1");
        assert!(json.get("isError").is_none());
    }

    #[test]
    fn tool_outcome_error_flag() {
        let block = ContentBlock::tool_error("req-1", json!("table not found"));
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["isError"], true);
    }

    #[test]
    fn predicates() {
        let text = ContentBlock::text("t");
        let request = ContentBlock::tool_request("r", "n", Map::new());
        let outcome = ContentBlock::tool_outcome("r", json!(null));
        assert!(text.is_text() && !text.is_tool_request());
        assert!(request.is_tool_request() && !request.is_tool_outcome());
        assert!(outcome.is_tool_outcome() && !outcome.is_text());
    }

    #[test]
    fn extract_text_mixed() {
        let blocks = vec![
            ContentBlock::text("first"),
            ContentBlock::tool_request("r", "n", Map::new()),
            ContentBlock::text("second"),
        ];
        assert_eq!(extract_text(&blocks), "first\nsecond");
    }

    #[test]
    fn extract_text_empty() {
        assert_eq!(extract_text(&[]), "");
    }

    #[test]
    fn text_block_count_mixed() {
        let blocks = vec![
            ContentBlock::text("a"),
            ContentBlock::tool_outcome("r", json!(1)),
            ContentBlock::text("b"),
        ];
        assert_eq!(text_block_count(&blocks), 2);
    }
}
