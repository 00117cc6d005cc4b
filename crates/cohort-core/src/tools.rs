//! Tool definition and result types.
//!
//! Defines the schema for capabilities the model can invoke, plus the
//! result type returned by tool execution.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─────────────────────────────────────────────────────────────────────────────
// Tool schema
// ─────────────────────────────────────────────────────────────────────────────

/// JSON Schema-compatible input definition for a tool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolInputSchema {
    /// Top-level JSON Schema type.
    #[serde(rename = "type")]
    pub schema_type: String,
    /// Property definitions (when type is `object`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Map<String, Value>>,
    /// Required property names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    /// Description of the schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Catch-all for additional JSON Schema properties.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ToolInputSchema {
    /// Build an `object` schema from property/required lists.
    #[must_use]
    pub fn object(
        properties: serde_json::Map<String, Value>,
        required: Vec<String>,
    ) -> Self {
        Self {
            schema_type: "object".into(),
            properties: Some(properties),
            required: if required.is_empty() {
                None
            } else {
                Some(required)
            },
            description: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// A tool declaration advertised to the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (unique identifier).
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's input.
    #[serde(rename = "inputSchema")]
    pub input_schema: ToolInputSchema,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool result
// ─────────────────────────────────────────────────────────────────────────────

/// Result of a tool execution, as handed back to the model and mirrored
/// onto the client event channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    /// The tool output payload (structured JSON or plain string).
    pub content: Value,
    /// Compact one-line summary for display.
    pub summary: String,
    /// Whether the execution resulted in an error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl ToolResult {
    /// Create a successful result.
    #[must_use]
    pub fn ok(content: Value, summary: impl Into<String>) -> Self {
        Self {
            content,
            summary: summary.into(),
            is_error: None,
        }
    }

    /// Create an error result.
    #[must_use]
    pub fn error(content: Value, summary: impl Into<String>) -> Self {
        Self {
            content,
            summary: summary.into(),
            is_error: Some(true),
        }
    }

    /// Whether this result carries the error flag.
    #[must_use]
    pub fn failed(&self) -> bool {
        self.is_error == Some(true)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
