//! `run_audience_query` tool — read-only query execution.
//!
//! Runs an analytical query against the tenant's data source. Mutating
//! statements are rejected before dispatch. Count-style results are
//! additionally scored by the quality evaluator and the evaluation is
//! merged into the payload handed back to the model.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::debug;

use cohort_core::tools::{ToolDefinition, ToolInputSchema, ToolResult};
use cohort_eval::types::CohortData;
use cohort_eval::{evaluate, infer_requirements};

use crate::errors::ToolError;
use crate::traits::{AnalyticsOps, CohortTool, QueryOutput, ToolContext};

/// Tool name as advertised to the model.
pub const QUERY_TOOL_NAME: &str = "run_audience_query";

/// Rows included in the payload before truncation.
const MAX_PAYLOAD_ROWS: usize = 100;

/// The `run_audience_query` tool.
pub struct QueryTool {
    analytics: Arc<dyn AnalyticsOps>,
}

impl QueryTool {
    /// Create the tool backed by the given analytics collaborator.
    pub fn new(analytics: Arc<dyn AnalyticsOps>) -> Self {
        Self { analytics }
    }
}

#[async_trait]
impl CohortTool for QueryTool {
    fn name(&self) -> &str {
        QUERY_TOOL_NAME
    }

    fn timeout_ms(&self) -> Option<u64> {
        Some(30_000)
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: QUERY_TOOL_NAME.into(),
            description: "Execute a read-only analytical query against this tenant's data \
                          source. Use COUNT(*) queries to size candidate audiences; count \
                          results come back with a quality evaluation attached."
                .into(),
            input_schema: ToolInputSchema::object(
                {
                    let mut m = serde_json::Map::new();
                    let _ = m.insert(
                        "sql".into(),
                        json!({
                            "type": "string",
                            "description": "The SELECT statement to run"
                        }),
                    );
                    m
                },
                vec!["sql".into()],
            ),
        }
    }

    async fn execute(
        &self,
        input: Map<String, Value>,
        ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let Some(sql) = input.get("sql").and_then(Value::as_str) else {
            return Err(ToolError::Validation {
                message: "missing required parameter: sql".into(),
            });
        };

        ensure_read_only(sql)?;

        let output = self.analytics.run_query(&ctx.tenant_id, sql).await?;
        debug!(row_count = output.row_count, "query executed");

        let mut payload = json!({
            "columns": output.columns,
            "rows": truncate_rows(&output.rows),
            "rowCount": output.row_count,
        });

        let mut summary = if output.row_count == 1 {
            "1 row".to_owned()
        } else {
            format!("{} rows", output.row_count)
        };

        if let Some(size) = count_result(sql, &output) {
            let requirements = infer_requirements(&ctx.user_text);
            let cohort = CohortData {
                size,
                sql: sql.to_owned(),
                breakdown: output.breakdown.clone(),
                total_population: output.total_population,
            };
            let evaluation = evaluate(&cohort, &requirements);
            summary = format!(
                "count {size}, quality {}/100",
                evaluation.quality_score
            );
            payload["evaluation"] = serde_json::to_value(&evaluation)?;
        }

        Ok(ToolResult::ok(payload, summary))
    }
}

/// Reject anything that is not a plain read.
///
/// The collaborator enforces read-only semantics at the source too; this
/// guard just fails fast with a message the model can act on.
fn ensure_read_only(sql: &str) -> Result<(), ToolError> {
    const FORBIDDEN: &[&str] = &[
        "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "TRUNCATE", "REPLACE", "ATTACH",
        "DETACH", "PRAGMA", "GRANT", "REVOKE", "VACUUM",
    ];

    let mut tokens = sql
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .map(str::to_ascii_uppercase);

    match tokens.next().as_deref() {
        Some("SELECT" | "WITH") => {}
        _ => {
            return Err(ToolError::Validation {
                message: "only SELECT (or WITH ... SELECT) statements are allowed".into(),
            });
        }
    }

    if let Some(keyword) = tokens.find(|t| FORBIDDEN.contains(&t.as_str())) {
        return Err(ToolError::Validation {
            message: format!("statement contains forbidden keyword {keyword}; queries must be read-only"),
        });
    }

    Ok(())
}

/// Detect a row-count style result and extract the count.
fn count_result(sql: &str, output: &QueryOutput) -> Option<u64> {
    let looks_like_count = sql.to_ascii_lowercase().contains("count(")
        || output
            .columns
            .first()
            .is_some_and(|c| c.to_ascii_lowercase().contains("count"));
    if !looks_like_count || output.rows.len() != 1 || output.columns.len() != 1 {
        return None;
    }
    output.rows[0].first()?.as_u64()
}

fn truncate_rows(rows: &[Vec<Value>]) -> Vec<Vec<Value>> {
    rows.iter().take(MAX_PAYLOAD_ROWS).cloned().collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
