//! `discover_schema` tool — tenant data-source introspection.
//!
//! Returns the tables, columns, types, and sample values available to the
//! tenant. No side effects; the model calls this before writing queries.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use cohort_core::tools::{ToolDefinition, ToolInputSchema, ToolResult};

use crate::errors::ToolError;
use crate::traits::{AnalyticsOps, CohortTool, ToolContext};

/// Tool name as advertised to the model.
pub const SCHEMA_TOOL_NAME: &str = "discover_schema";

/// The `discover_schema` tool.
pub struct SchemaTool {
    analytics: Arc<dyn AnalyticsOps>,
}

impl SchemaTool {
    /// Create the tool backed by the given analytics collaborator.
    pub fn new(analytics: Arc<dyn AnalyticsOps>) -> Self {
        Self { analytics }
    }
}

#[async_trait]
impl CohortTool for SchemaTool {
    fn name(&self) -> &str {
        SCHEMA_TOOL_NAME
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: SCHEMA_TOOL_NAME.into(),
            description: "Discover the tables, columns, types, and sample values available \
                          in this tenant's analytical data source. Call this before writing \
                          queries so table and column names are exact."
                .into(),
            input_schema: ToolInputSchema::object(
                {
                    let mut m = serde_json::Map::new();
                    let _ = m.insert(
                        "table".into(),
                        json!({
                            "type": "string",
                            "description": "Restrict discovery to a single table (optional)"
                        }),
                    );
                    m
                },
                Vec::new(),
            ),
        }
    }

    async fn execute(
        &self,
        input: Map<String, Value>,
        ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let schema = self.analytics.discover_schema(&ctx.tenant_id).await?;

        // Optional narrowing to one table when the collaborator returns the
        // conventional {"tables": [...]} shape.
        let filtered = match input.get("table").and_then(Value::as_str) {
            Some(table) => filter_to_table(&schema, table),
            None => schema,
        };

        let table_count = filtered
            .get("tables")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        let summary = if table_count == 1 {
            "1 table described".to_owned()
        } else {
            format!("{table_count} tables described")
        };

        Ok(ToolResult::ok(filtered, summary))
    }
}

fn filter_to_table(schema: &Value, table: &str) -> Value {
    let Some(tables) = schema.get("tables").and_then(Value::as_array) else {
        return schema.clone();
    };
    let matched: Vec<Value> = tables
        .iter()
        .filter(|t| {
            t.get("name")
                .and_then(Value::as_str)
                .is_some_and(|n| n.eq_ignore_ascii_case(table))
        })
        .cloned()
        .collect();
    json!({ "tables": matched })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
