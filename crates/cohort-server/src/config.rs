//! Server configuration.
//!
//! Layered with figment: compiled defaults, then an optional JSON file,
//! then `COHORT_`-prefixed environment variables on top.

use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized};
use serde::{Deserialize, Serialize};

/// Configuration for the cohort server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` for auto-assign).
    pub port: u16,
    /// Path to the transcript `SQLite` database.
    pub database_path: String,
    /// Root directory for the tenant-scoped memory store.
    pub memory_root: String,
    /// Model ID for new sessions.
    pub model: String,
    /// Sampling temperature for new sessions.
    pub temperature: f64,
    /// Output-token ceiling per model turn.
    pub max_tokens: u32,
    /// Iteration ceiling per conversational turn.
    pub max_iterations: u32,
    /// Block count above which older tool outcomes are pruned.
    pub pruning_trigger_blocks: usize,
    /// Most-recent tool outcomes kept intact when pruning.
    pub pruning_keep_recent: usize,
    /// Per-file memory store ceiling in bytes.
    pub memory_max_file_bytes: u64,
    /// Per-tenant aggregate memory store ceiling in bytes.
    pub memory_max_total_bytes: u64,
    /// Workflow tag recorded on transcripts.
    pub workflow: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            database_path: "cohort.db".into(),
            memory_root: "memory".into(),
            model: "claude-sonnet-4-5".into(),
            temperature: 0.2,
            max_tokens: 8192,
            max_iterations: 12,
            pruning_trigger_blocks: 40,
            pruning_keep_recent: 3,
            memory_max_file_bytes: 1024 * 1024,
            memory_max_total_bytes: 10 * 1024 * 1024,
            workflow: "audience_builder".into(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from `cohort.json` and the environment.
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from("cohort.json")
    }

    /// Load configuration from a specific JSON file and the environment.
    pub fn load_from(path: &str) -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Json::file(path))
            .merge(Env::prefixed("COHORT_"))
            .extract()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
