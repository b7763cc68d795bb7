//! Demo scenarios and the in-process collaborators they share.

pub mod approval_flow;
pub mod guardrails;
pub mod model_loop;
pub mod policy_file;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use tollgate_audit::InMemoryAuditWriter;
use tollgate_contracts::{
    agent::RunId,
    capability::McpCapability,
    error::{TollgateError, TollgateResult},
};
use tollgate_core::tools::McpServer;

// ── In-memory MCP filesystem ─────────────────────────────────────────────────

/// An MCP server exposing `read_file` and `write_file` over a map of paths.
pub struct MemoryFilesystem {
    files: Mutex<BTreeMap<String, String>>,
}

impl MemoryFilesystem {
    pub fn new() -> Arc<Self> {
        let mut files = BTreeMap::new();
        files.insert("README.md".to_string(), "# Tollgate\n".to_string());
        Arc::new(Self {
            files: Mutex::new(files),
        })
    }

    pub fn capabilities() -> Vec<McpCapability> {
        vec![
            McpCapability::new("read_file", "Read a file", 2),
            McpCapability::new("write_file", "Write a file", 5),
        ]
    }

    pub fn contents(&self, path: &str) -> Option<String> {
        self.files.lock().ok()?.get(path).cloned()
    }
}

#[async_trait]
impl McpServer for MemoryFilesystem {
    fn id(&self) -> Option<&str> {
        Some("filesystem")
    }

    fn url(&self) -> &str {
        "memory://filesystem"
    }

    async fn call_tool(&self, tool_name: &str, args: Map<String, Value>) -> TollgateResult<Value> {
        let path = args
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| TollgateError::McpExec {
                reason: format!("{} requires a path", tool_name),
            })?
            .to_string();
        let mut files = self.files.lock().map_err(|e| TollgateError::McpExec {
            reason: format!("filesystem lock poisoned: {}", e),
        })?;

        match tool_name {
            "read_file" => Ok(json!({ "path": path, "content": files.get(&path) })),
            "write_file" => {
                let content = args.get("content").and_then(Value::as_str).unwrap_or("").to_string();
                let bytes = content.len();
                files.insert(path.clone(), content);
                Ok(json!({ "path": path, "bytes_written": bytes }))
            }
            other => Err(TollgateError::McpExec {
                reason: format!("unknown filesystem tool '{}'", other),
            }),
        }
    }

    async fn list_tools(&self) -> TollgateResult<Vec<McpCapability>> {
        Ok(Self::capabilities())
    }
}

// ── Output helpers ───────────────────────────────────────────────────────────

pub fn print_audit(audit: &InMemoryAuditWriter, run_id: &RunId) -> TollgateResult<()> {
    let intact = audit.verify_integrity(run_id)?;
    let (events, finalized) = audit
        .export_log(run_id)?
        .map(|log| (log.events.len(), log.finalized))
        .unwrap_or((0, false));
    tracing::info!(run_id = %run_id, events, intact, finalized, "audit chain checked");
    println!(
        "  Audit chain:            {} ({} event(s){})",
        if intact { "VERIFIED" } else { "FAILED" },
        events,
        if finalized { ", finalized" } else { ", open" }
    );
    Ok(())
}
