//! Development server binary.
//!
//! Wires the HTTP surface to a canned model provider and a stub
//! analytics source so the full turn loop (SSE stream, transcripts,
//! memory tool) can be exercised locally without external services.
//!
//! Tenant keys come from `COHORT_API_KEY` (default `dev-key`); send it
//! as the `x-api-key` header.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;

use cohort_core::ids::TenantId;
use cohort_llm::mock::MockProvider;
use cohort_server::telemetry::init_tracing;
use cohort_server::{ServerConfig, StaticTenantResolver, build_state, serve};
use cohort_tools::errors::ToolError;
use cohort_tools::traits::QueryOutput;

/// Fixed-schema analytics source for local development.
struct DevAnalytics;

#[async_trait]
impl cohort_tools::AnalyticsOps for DevAnalytics {
    async fn discover_schema(&self, _tenant_id: &TenantId) -> Result<Value, ToolError> {
        Ok(json!({
            "tables": [{
                "name": "shoppers",
                "columns": [
                    { "name": "shopper_id", "type": "TEXT" },
                    { "name": "lifetime_spend", "type": "REAL" },
                    { "name": "last_purchase_at", "type": "TEXT" }
                ]
            }]
        }))
    }

    async fn run_query(&self, _tenant_id: &TenantId, _sql: &str) -> Result<QueryOutput, ToolError> {
        Ok(QueryOutput {
            columns: vec!["count".into()],
            rows: vec![vec![json!(125_000)]],
            row_count: 1,
            breakdown: None,
            total_population: Some(2_000_000),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ServerConfig::load()?;
    info!(
        host = %config.host,
        port = config.port,
        database = %config.database_path,
        "starting development server"
    );

    let api_key = std::env::var("COHORT_API_KEY").unwrap_or_else(|_| "dev-key".into());
    let resolver =
        Arc::new(StaticTenantResolver::new().with_key(api_key, TenantId::from("dev-tenant")));

    let provider = Arc::new(MockProvider::canned(
        "## Audience\n\nApproximately 125,000 shoppers match your criteria.",
    ));

    let state = build_state(provider, Arc::new(DevAnalytics), resolver, config.clone())?;

    tokio::select! {
        result = serve(state, &config) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }
    Ok(())
}
