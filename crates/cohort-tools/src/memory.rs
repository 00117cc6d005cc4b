//! `audience_memory` tool — tenant-scoped hierarchical text store.
//!
//! A sandboxed file store the model uses to keep notes across turns and
//! sessions. Every path is validated against the tenant's root before any
//! filesystem effect; per-file and aggregate size ceilings are enforced
//! before a write is committed. Within one session access is serialized by
//! the orchestration loop; cross-session writes to the same tenant are
//! last-write-wins at file granularity.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::fs;
use tracing::debug;

use cohort_core::ids::TenantId;
use cohort_core::tools::{ToolDefinition, ToolInputSchema, ToolResult};

use crate::errors::ToolError;
use crate::traits::{CohortTool, ToolContext};

/// Tool name as advertised to the model.
pub const MEMORY_TOOL_NAME: &str = "audience_memory";

/// Size ceilings for the memory store.
#[derive(Clone, Copy, Debug)]
pub struct MemoryLimits {
    /// Maximum bytes per file.
    pub max_file_bytes: u64,
    /// Maximum aggregate bytes per tenant.
    pub max_total_bytes: u64,
}

impl Default for MemoryLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: 1024 * 1024,
            max_total_bytes: 10 * 1024 * 1024,
        }
    }
}

/// The `audience_memory` tool.
pub struct MemoryTool {
    root: Arc<PathBuf>,
    limits: MemoryLimits,
}

impl MemoryTool {
    /// Create the tool rooted at `root`. Each tenant gets a subdirectory.
    pub fn new(root: impl Into<PathBuf>, limits: MemoryLimits) -> Self {
        Self {
            root: Arc::new(root.into()),
            limits,
        }
    }

    fn tenant_root(&self, tenant_id: &TenantId) -> PathBuf {
        self.root.join(tenant_id.as_str())
    }

    /// Resolve a user-supplied path inside the tenant root.
    ///
    /// Rejects absolute paths and any traversal component before touching
    /// the filesystem.
    fn resolve(&self, tenant_id: &TenantId, raw: &str) -> Result<PathBuf, ToolError> {
        let path = Path::new(raw);
        if raw.is_empty() || path.is_absolute() {
            return Err(ToolError::PathEscape {
                path: raw.to_owned(),
            });
        }
        for component in path.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(ToolError::PathEscape {
                        path: raw.to_owned(),
                    });
                }
            }
        }
        Ok(self.tenant_root(tenant_id).join(path))
    }

    /// Aggregate bytes currently stored for a tenant.
    async fn total_bytes(&self, tenant_id: &TenantId) -> Result<u64, ToolError> {
        let mut total = 0u64;
        let mut stack = vec![self.tenant_root(tenant_id)];
        while let Some(dir) = stack.pop() {
            let Ok(mut entries) = fs::read_dir(&dir).await else {
                continue;
            };
            while let Some(entry) = entries.next_entry().await? {
                let meta = entry.metadata().await?;
                if meta.is_dir() {
                    stack.push(entry.path());
                } else {
                    total += meta.len();
                }
            }
        }
        Ok(total)
    }

    /// Enforce both ceilings for a prospective write of `new_len` bytes to
    /// a file currently holding `existing_len` bytes.
    async fn check_ceilings(
        &self,
        tenant_id: &TenantId,
        existing_len: u64,
        new_len: u64,
    ) -> Result<(), ToolError> {
        if new_len > self.limits.max_file_bytes {
            return Err(ToolError::SizeLimit {
                message: format!(
                    "file would be {new_len} bytes; per-file ceiling is {} bytes",
                    self.limits.max_file_bytes
                ),
            });
        }
        let total = self.total_bytes(tenant_id).await?;
        let projected = total.saturating_sub(existing_len).saturating_add(new_len);
        if projected > self.limits.max_total_bytes {
            return Err(ToolError::SizeLimit {
                message: format!(
                    "tenant store would hold {projected} bytes; aggregate ceiling is {} bytes",
                    self.limits.max_total_bytes
                ),
            });
        }
        Ok(())
    }

    async fn view(&self, tenant_id: &TenantId, path: &str) -> Result<ToolResult, ToolError> {
        let resolved = self.resolve(tenant_id, path)?;
        let meta = fs::metadata(&resolved)
            .await
            .map_err(|_| ToolError::FileNotFound {
                path: path.to_owned(),
            })?;

        if meta.is_dir() {
            let mut entries = Vec::new();
            let mut dir = fs::read_dir(&resolved).await?;
            while let Some(entry) = dir.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                if entry.metadata().await?.is_dir() {
                    entries.push(format!("{name}/"));
                } else {
                    entries.push(name);
                }
            }
            entries.sort();
            let summary = format!("{} entries", entries.len());
            return Ok(ToolResult::ok(
                json!({ "path": path, "entries": entries }),
                summary,
            ));
        }

        let content = fs::read_to_string(&resolved).await?;
        let numbered: String = content
            .lines()
            .enumerate()
            .map(|(i, line)| format!("{}: {line}\n", i + 1))
            .collect();
        let summary = format!("{} lines", content.lines().count());
        Ok(ToolResult::ok(
            json!({ "path": path, "content": numbered }),
            summary,
        ))
    }

    async fn create(
        &self,
        tenant_id: &TenantId,
        path: &str,
        file_text: &str,
    ) -> Result<ToolResult, ToolError> {
        let resolved = self.resolve(tenant_id, path)?;
        let existing_len = fs::metadata(&resolved).await.map_or(0, |m| m.len());
        self.check_ceilings(tenant_id, existing_len, file_text.len() as u64)
            .await?;

        if let Some(parent) = resolved.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&resolved, file_text).await?;
        debug!(path, bytes = file_text.len(), "memory file written");
        Ok(ToolResult::ok(
            json!({ "path": path, "bytes": file_text.len() }),
            format!("wrote {path}"),
        ))
    }

    async fn str_replace(
        &self,
        tenant_id: &TenantId,
        path: &str,
        old_str: &str,
        new_str: &str,
    ) -> Result<ToolResult, ToolError> {
        if old_str.is_empty() {
            return Err(ToolError::Validation {
                message: "old_str must not be empty".into(),
            });
        }
        let resolved = self.resolve(tenant_id, path)?;
        let content = fs::read_to_string(&resolved)
            .await
            .map_err(|_| ToolError::FileNotFound {
                path: path.to_owned(),
            })?;

        let occurrences = content.matches(old_str).count();
        if occurrences == 0 {
            return Err(ToolError::Validation {
                message: format!("old_str not found in {path}"),
            });
        }
        if occurrences > 1 {
            return Err(ToolError::Validation {
                message: format!(
                    "old_str appears {occurrences} times in {path}; make it unique"
                ),
            });
        }

        let updated = content.replacen(old_str, new_str, 1);
        self.check_ceilings(tenant_id, content.len() as u64, updated.len() as u64)
            .await?;
        fs::write(&resolved, &updated).await?;
        Ok(ToolResult::ok(
            json!({ "path": path, "replacements": 1 }),
            format!("edited {path}"),
        ))
    }

    async fn insert(
        &self,
        tenant_id: &TenantId,
        path: &str,
        insert_line: usize,
        insert_text: &str,
    ) -> Result<ToolResult, ToolError> {
        let resolved = self.resolve(tenant_id, path)?;
        let content = fs::read_to_string(&resolved)
            .await
            .map_err(|_| ToolError::FileNotFound {
                path: path.to_owned(),
            })?;

        let mut lines: Vec<&str> = content.lines().collect();
        if insert_line > lines.len() {
            return Err(ToolError::Validation {
                message: format!(
                    "insert_line {insert_line} is beyond the end of {path} ({} lines)",
                    lines.len()
                ),
            });
        }
        lines.insert(insert_line, insert_text);
        let mut updated = lines.join("\n");
        if content.ends_with('\n') || content.is_empty() {
            updated.push('\n');
        }

        self.check_ceilings(tenant_id, content.len() as u64, updated.len() as u64)
            .await?;
        fs::write(&resolved, &updated).await?;
        Ok(ToolResult::ok(
            json!({ "path": path, "insertedAt": insert_line }),
            format!("inserted into {path}"),
        ))
    }

    async fn delete(&self, tenant_id: &TenantId, path: &str) -> Result<ToolResult, ToolError> {
        let resolved = self.resolve(tenant_id, path)?;
        let meta = fs::metadata(&resolved)
            .await
            .map_err(|_| ToolError::FileNotFound {
                path: path.to_owned(),
            })?;
        if meta.is_dir() {
            fs::remove_dir_all(&resolved).await?;
        } else {
            fs::remove_file(&resolved).await?;
        }
        Ok(ToolResult::ok(
            json!({ "path": path, "deleted": true }),
            format!("deleted {path}"),
        ))
    }

    async fn rename(
        &self,
        tenant_id: &TenantId,
        path: &str,
        new_path: &str,
    ) -> Result<ToolResult, ToolError> {
        let from = self.resolve(tenant_id, path)?;
        let to = self.resolve(tenant_id, new_path)?;
        if fs::metadata(&from).await.is_err() {
            return Err(ToolError::FileNotFound {
                path: path.to_owned(),
            });
        }
        if fs::metadata(&to).await.is_ok() {
            return Err(ToolError::Validation {
                message: format!("destination already exists: {new_path}"),
            });
        }
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::rename(&from, &to).await?;
        Ok(ToolResult::ok(
            json!({ "from": path, "to": new_path }),
            format!("renamed {path} to {new_path}"),
        ))
    }
}

fn required_str<'a>(input: &'a Map<String, Value>, key: &str) -> Result<&'a str, ToolError> {
    input
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::Validation {
            message: format!("missing required parameter: {key}"),
        })
}

#[async_trait]
impl CohortTool for MemoryTool {
    fn name(&self) -> &str {
        MEMORY_TOOL_NAME
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: MEMORY_TOOL_NAME.into(),
            description: "Read and write notes in your private memory store. Paths are \
                          relative to the store root. Commands: view, create, str_replace, \
                          insert, delete, rename."
                .into(),
            input_schema: ToolInputSchema::object(
                {
                    let mut m = serde_json::Map::new();
                    let _ = m.insert(
                        "command".into(),
                        json!({
                            "type": "string",
                            "enum": ["view", "create", "str_replace", "insert", "delete", "rename"],
                            "description": "The operation to perform"
                        }),
                    );
                    let _ = m.insert(
                        "path".into(),
                        json!({"type": "string", "description": "Path relative to the store root"}),
                    );
                    let _ = m.insert(
                        "file_text".into(),
                        json!({"type": "string", "description": "Full file content (create)"}),
                    );
                    let _ = m.insert(
                        "old_str".into(),
                        json!({"type": "string", "description": "Unique text to replace (str_replace)"}),
                    );
                    let _ = m.insert(
                        "new_str".into(),
                        json!({"type": "string", "description": "Replacement text (str_replace)"}),
                    );
                    let _ = m.insert(
                        "insert_line".into(),
                        json!({"type": "integer", "description": "Line to insert after, 0 for top (insert)"}),
                    );
                    let _ = m.insert(
                        "insert_text".into(),
                        json!({"type": "string", "description": "Text to insert (insert)"}),
                    );
                    let _ = m.insert(
                        "new_path".into(),
                        json!({"type": "string", "description": "Destination path (rename)"}),
                    );
                    m
                },
                vec!["command".into(), "path".into()],
            ),
        }
    }

    async fn execute(
        &self,
        input: Map<String, Value>,
        ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let command = required_str(&input, "command")?;
        let path = required_str(&input, "path")?;
        let tenant_id = &ctx.tenant_id;

        match command {
            "view" => self.view(tenant_id, path).await,
            "create" => {
                let file_text = required_str(&input, "file_text")?;
                self.create(tenant_id, path, file_text).await
            }
            "str_replace" => {
                let old_str = required_str(&input, "old_str")?;
                let new_str = input.get("new_str").and_then(Value::as_str).unwrap_or("");
                self.str_replace(tenant_id, path, old_str, new_str).await
            }
            "insert" => {
                let insert_line = input
                    .get("insert_line")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| ToolError::Validation {
                        message: "missing required parameter: insert_line".into(),
                    })?;
                let insert_text = required_str(&input, "insert_text")?;
                #[allow(clippy::cast_possible_truncation)]
                self.insert(tenant_id, path, insert_line as usize, insert_text)
                    .await
            }
            "delete" => self.delete(tenant_id, path).await,
            "rename" => {
                let new_path = required_str(&input, "new_path")?;
                self.rename(tenant_id, path, new_path).await
            }
            other => Err(ToolError::Validation {
                message: format!("unknown command: {other}"),
            }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use cohort_core::ids::SessionId;
    use tokio_util::sync::CancellationToken;

    fn ctx() -> ToolContext {
        ToolContext {
            tool_request_id: "req-1".into(),
            session_id: SessionId::from("sess-1"),
            tenant_id: TenantId::from("ten-1"),
            user_text: String::new(),
            cancellation: CancellationToken::new(),
        }
    }

    fn tool(root: &Path) -> MemoryTool {
        MemoryTool::new(root, MemoryLimits::default())
    }

    fn input(pairs: &[(&str, Value)]) -> Map<String, Value> {
        let mut m = Map::new();
        for (k, v) in pairs {
            let _ = m.insert((*k).to_owned(), v.clone());
        }
        m
    }

    #[tokio::test]
    async fn create_then_view_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool(dir.path());
        let ctx = ctx();

        let created = tool
            .execute(
                input(&[
                    ("command", json!("create")),
                    ("path", json!("notes/segments.md")),
                    ("file_text", json!("high-value shoppers\nlapsed buyers\n")),
                ]),
                &ctx,
            )
            .await
            .unwrap();
        assert!(!created.failed());

        let viewed = tool
            .execute(
                input(&[("command", json!("view")), ("path", json!("notes/segments.md"))]),
                &ctx,
            )
            .await
            .unwrap();
        let content = viewed.content["content"].as_str().unwrap();
        assert!(content.contains("1: high-value shoppers"));
        assert!(content.contains("2: lapsed buyers"));
    }

    #[tokio::test]
    async fn view_directory_lists_entries() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool(dir.path());
        let ctx = ctx();

        for name in ["b.md", "a.md"] {
            let _ = tool
                .execute(
                    input(&[
                        ("command", json!("create")),
                        ("path", json!(name)),
                        ("file_text", json!("x")),
                    ]),
                    &ctx,
                )
                .await
                .unwrap();
        }

        let viewed = tool
            .execute(input(&[("command", json!("view")), ("path", json!("."))]), &ctx)
            .await
            .unwrap();
        let entries = viewed.content["entries"].as_array().unwrap();
        assert_eq!(entries[0], "a.md");
        assert_eq!(entries[1], "b.md");
    }

    #[tokio::test]
    async fn traversal_rejected_before_any_effect() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool(dir.path());
        let ctx = ctx();

        for command in ["view", "create", "str_replace", "insert", "delete", "rename"] {
            let err = tool
                .execute(
                    input(&[
                        ("command", json!(command)),
                        ("path", json!("../other-tenant/file.md")),
                        ("file_text", json!("x")),
                        ("old_str", json!("a")),
                        ("insert_line", json!(0)),
                        ("insert_text", json!("x")),
                        ("new_path", json!("ok.md")),
                    ]),
                    &ctx,
                )
                .await
                .unwrap_err();
            assert_matches!(err, ToolError::PathEscape { .. }, "command {command}");
        }
        // nothing was written anywhere
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn absolute_path_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool(dir.path());
        let err = tool
            .execute(
                input(&[("command", json!("view")), ("path", json!("/etc/passwd"))]),
                &ctx(),
            )
            .await
            .unwrap_err();
        assert_matches!(err, ToolError::PathEscape { .. });
    }

    #[tokio::test]
    async fn rename_destination_also_validated() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool(dir.path());
        let ctx = ctx();
        let _ = tool
            .execute(
                input(&[
                    ("command", json!("create")),
                    ("path", json!("a.md")),
                    ("file_text", json!("x")),
                ]),
                &ctx,
            )
            .await
            .unwrap();

        let err = tool
            .execute(
                input(&[
                    ("command", json!("rename")),
                    ("path", json!("a.md")),
                    ("new_path", json!("../escape.md")),
                ]),
                &ctx,
            )
            .await
            .unwrap_err();
        assert_matches!(err, ToolError::PathEscape { .. });
    }

    #[tokio::test]
    async fn per_file_ceiling_enforced_before_write() {
        let dir = tempfile::tempdir().unwrap();
        let tool = MemoryTool::new(
            dir.path(),
            MemoryLimits {
                max_file_bytes: 10,
                max_total_bytes: 1000,
            },
        );
        let err = tool
            .execute(
                input(&[
                    ("command", json!("create")),
                    ("path", json!("big.md")),
                    ("file_text", json!("this is more than ten bytes")),
                ]),
                &ctx(),
            )
            .await
            .unwrap_err();
        assert_matches!(err, ToolError::SizeLimit { .. });
        assert!(!dir.path().join("ten-1/big.md").exists());
    }

    #[tokio::test]
    async fn aggregate_ceiling_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let tool = MemoryTool::new(
            dir.path(),
            MemoryLimits {
                max_file_bytes: 100,
                max_total_bytes: 120,
            },
        );
        let ctx = ctx();
        let _ = tool
            .execute(
                input(&[
                    ("command", json!("create")),
                    ("path", json!("a.md")),
                    ("file_text", json!(&"x".repeat(100))),
                ]),
                &ctx,
            )
            .await
            .unwrap();

        let err = tool
            .execute(
                input(&[
                    ("command", json!("create")),
                    ("path", json!("b.md")),
                    ("file_text", json!(&"y".repeat(50))),
                ]),
                &ctx,
            )
            .await
            .unwrap_err();
        assert_matches!(err, ToolError::SizeLimit { .. });
    }

    #[tokio::test]
    async fn str_replace_requires_unique_match() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool(dir.path());
        let ctx = ctx();
        let _ = tool
            .execute(
                input(&[
                    ("command", json!("create")),
                    ("path", json!("a.md")),
                    ("file_text", json!("alpha beta alpha")),
                ]),
                &ctx,
            )
            .await
            .unwrap();

        let err = tool
            .execute(
                input(&[
                    ("command", json!("str_replace")),
                    ("path", json!("a.md")),
                    ("old_str", json!("alpha")),
                    ("new_str", json!("gamma")),
                ]),
                &ctx,
            )
            .await
            .unwrap_err();
        assert_matches!(err, ToolError::Validation { .. });

        let ok = tool
            .execute(
                input(&[
                    ("command", json!("str_replace")),
                    ("path", json!("a.md")),
                    ("old_str", json!("beta")),
                    ("new_str", json!("delta")),
                ]),
                &ctx,
            )
            .await
            .unwrap();
        assert!(!ok.failed());
    }

    #[tokio::test]
    async fn insert_at_line() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool(dir.path());
        let ctx = ctx();
        let _ = tool
            .execute(
                input(&[
                    ("command", json!("create")),
                    ("path", json!("a.md")),
                    ("file_text", json!("first\nthird\n")),
                ]),
                &ctx,
            )
            .await
            .unwrap();

        let _ = tool
            .execute(
                input(&[
                    ("command", json!("insert")),
                    ("path", json!("a.md")),
                    ("insert_line", json!(1)),
                    ("insert_text", json!("second")),
                ]),
                &ctx,
            )
            .await
            .unwrap();

        let viewed = tool
            .execute(input(&[("command", json!("view")), ("path", json!("a.md"))]), &ctx)
            .await
            .unwrap();
        let content = viewed.content["content"].as_str().unwrap();
        assert!(content.contains("2: second"));
        assert!(content.contains("3: third"));
    }

    #[tokio::test]
    async fn delete_and_rename() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool(dir.path());
        let ctx = ctx();
        let _ = tool
            .execute(
                input(&[
                    ("command", json!("create")),
                    ("path", json!("a.md")),
                    ("file_text", json!("x")),
                ]),
                &ctx,
            )
            .await
            .unwrap();

        let _ = tool
            .execute(
                input(&[
                    ("command", json!("rename")),
                    ("path", json!("a.md")),
                    ("new_path", json!("archive/a.md")),
                ]),
                &ctx,
            )
            .await
            .unwrap();
        assert!(dir.path().join("ten-1/archive/a.md").exists());

        let _ = tool
            .execute(
                input(&[("command", json!("delete")), ("path", json!("archive/a.md"))]),
                &ctx,
            )
            .await
            .unwrap();
        assert!(!dir.path().join("ten-1/archive/a.md").exists());
    }

    #[tokio::test]
    async fn rename_onto_existing_fails() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool(dir.path());
        let ctx = ctx();
        for name in ["a.md", "b.md"] {
            let _ = tool
                .execute(
                    input(&[
                        ("command", json!("create")),
                        ("path", json!(name)),
                        ("file_text", json!("x")),
                    ]),
                    &ctx,
                )
                .await
                .unwrap();
        }
        let err = tool
            .execute(
                input(&[
                    ("command", json!("rename")),
                    ("path", json!("a.md")),
                    ("new_path", json!("b.md")),
                ]),
                &ctx,
            )
            .await
            .unwrap_err();
        assert_matches!(err, ToolError::Validation { .. });
    }

    #[tokio::test]
    async fn tenants_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool(dir.path());
        let ctx_a = ctx();
        let mut ctx_b = ctx();
        ctx_b.tenant_id = TenantId::from("ten-2");

        let _ = tool
            .execute(
                input(&[
                    ("command", json!("create")),
                    ("path", json!("shared.md")),
                    ("file_text", json!("tenant one data")),
                ]),
                &ctx_a,
            )
            .await
            .unwrap();

        let err = tool
            .execute(
                input(&[("command", json!("view")), ("path", json!("shared.md"))]),
                &ctx_b,
            )
            .await
            .unwrap_err();
        assert_matches!(err, ToolError::FileNotFound { .. });
    }

    #[tokio::test]
    async fn unknown_command_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool(dir.path());
        let err = tool
            .execute(
                input(&[("command", json!("append")), ("path", json!("a.md"))]),
                &ctx(),
            )
            .await
            .unwrap_err();
        assert_matches!(err, ToolError::Validation { .. });
    }
}
