//! Diagnostic classification of tool failures.
//!
//! Maps raw tool execution failures to a closed taxonomy of actionable
//! diagnoses. The diagnostic is serialized as the tool's outcome and
//! returned to the model like any other result, so retryable mistakes are
//! self-healed within the conversation instead of surfacing as hard
//! failures to the end user.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Closed set of failure kinds the classifier can produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticKind {
    /// The query referenced a table that does not exist.
    TableNameError,
    /// The query failed to parse.
    SqlSyntaxError,
    /// The query referenced a column that does not exist.
    ColumnNotFound,
    /// The query exceeded its execution time budget.
    QueryTimeout,
    /// The data source could not be reached.
    DatabaseConnectionError,
    /// Any other tool execution failure.
    ToolExecutionError,
}

/// A machine-consumable remediation hint attached to a failed tool call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredDiagnostic {
    /// Failure kind.
    pub kind: DiagnosticKind,
    /// Original failure message, verbatim.
    pub message: String,
    /// Human-readable remediation paragraph.
    pub suggestion: String,
    /// A corrected example, where one can be produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrected_example: Option<String>,
}

impl StructuredDiagnostic {
    /// Serialize this diagnostic as a tool outcome payload.
    #[must_use]
    pub fn to_outcome(&self) -> Value {
        json!({
            "error": true,
            "kind": self.kind,
            "message": self.message,
            "suggestion": self.suggestion,
            "correctedExample": self.corrected_example,
        })
    }
}

/// Classify a raw tool failure into a structured diagnostic.
///
/// Matching is substring-based over the lowercased failure message;
/// anything unrecognized falls through to `TOOL_EXECUTION_ERROR`.
#[must_use]
pub fn classify(
    tool_name: &str,
    raw_error: &str,
    tool_input: &Map<String, Value>,
) -> StructuredDiagnostic {
    let lower = raw_error.to_ascii_lowercase();
    let sql = tool_input.get("sql").and_then(Value::as_str);

    let (kind, suggestion, corrected_example) = if lower.contains("table")
        && (lower.contains("not found")
            || lower.contains("does not exist")
            || lower.contains("no such table")
            || lower.contains("unknown table"))
    {
        (
            DiagnosticKind::TableNameError,
            "The table name in the query does not exist in this tenant's data source. \
             Call discover_schema to list the available tables and their exact names, \
             then rewrite the query using one of them."
                .to_owned(),
            sql.map(|_| {
                "SELECT COUNT(*) FROM shoppers WHERE last_purchase_at > date('now', '-90 days')"
                    .to_owned()
            }),
        )
    } else if lower.contains("no such column")
        || (lower.contains("column")
            && (lower.contains("not found")
                || lower.contains("does not exist")
                || lower.contains("unknown")))
    {
        (
            DiagnosticKind::ColumnNotFound,
            "The query references a column that does not exist on the table. \
             Check the column list from discover_schema; column names are case-sensitive \
             and must match exactly."
                .to_owned(),
            None,
        )
    } else if lower.contains("syntax") {
        (
            DiagnosticKind::SqlSyntaxError,
            "The query failed to parse. Check for unbalanced parentheses, missing commas, \
             and misplaced keywords, then resubmit the corrected statement."
                .to_owned(),
            sql.map(|_| "SELECT COUNT(*) FROM shoppers WHERE age BETWEEN 25 AND 34".to_owned()),
        )
    } else if lower.contains("timeout") || lower.contains("timed out") {
        (
            DiagnosticKind::QueryTimeout,
            "The query exceeded its execution time budget. Narrow it with additional \
             filters or aggregate at a coarser grain before retrying."
                .to_owned(),
            None,
        )
    } else if lower.contains("connection") || lower.contains("connect") {
        (
            DiagnosticKind::DatabaseConnectionError,
            "The data source could not be reached. This is transient; retry the same \
             query once before changing anything."
                .to_owned(),
            None,
        )
    } else {
        (
            DiagnosticKind::ToolExecutionError,
            format!(
                "The {tool_name} tool failed. Review the message, adjust the input, and try again."
            ),
            None,
        )
    };

    StructuredDiagnostic {
        kind,
        message: raw_error.to_owned(),
        suggestion,
        corrected_example,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
