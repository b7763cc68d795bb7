//! Tool constructors: local functions, hosted MCP bridges and skills.
//!
//! The MCP transport itself is external. `McpServer` is the boundary a
//! transport crate implements; `hosted_mcp_tool` wraps one into a `Tool`,
//! `discover_mcp_tool` does the same after asking the server for its tools.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use tollgate_contracts::{
    capability::McpCapability,
    error::{TollgateError, TollgateResult},
};

use crate::{
    agent::{McpMetadata, SkillMetadata, Tool, ToolSpec},
    traits::{ToolAction, ToolContext},
};

// ── Function tools ───────────────────────────────────────────────────────────

/// A `ToolAction` backed by an async closure over the call arguments.
pub struct FnAction<F, Fut> {
    f: F,
    _marker: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnAction<F, Fut>
where
    F: Fn(Map<String, Value>) -> Fut + Send + Sync,
    Fut: Future<Output = TollgateResult<Value>> + Send,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut> ToolAction for FnAction<F, Fut>
where
    F: Fn(Map<String, Value>) -> Fut + Send + Sync,
    Fut: Future<Output = TollgateResult<Value>> + Send,
{
    async fn execute(&self, args: Map<String, Value>, _ctx: &ToolContext<'_>) -> TollgateResult<Value> {
        (self.f)(args).await
    }
}

/// Build a `function` tool from an async closure.
pub fn function_tool<F, Fut>(
    name: impl Into<String>,
    description: impl Into<String>,
    parameters: Option<Value>,
    f: F,
) -> TollgateResult<Tool>
where
    F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TollgateResult<Value>> + Send + 'static,
{
    let name = name.into();
    let description = description.into();
    if name.trim().is_empty() {
        return Err(TollgateError::SkillSchema {
            reason: "tool name is required".to_string(),
        });
    }
    if description.trim().is_empty() {
        return Err(TollgateError::SkillSchema {
            reason: format!("tool '{}' requires a description", name),
        });
    }

    let mut tool = Tool::new(name, description, ToolSpec::Function, Arc::new(FnAction::new(f)));
    tool.parameters = parameters;
    Ok(tool)
}

// ── Hosted MCP ───────────────────────────────────────────────────────────────

/// A reachable MCP server.
#[async_trait]
pub trait McpServer: Send + Sync {
    /// Server identifier. `None` falls back to the url.
    fn id(&self) -> Option<&str>;

    fn url(&self) -> &str;

    async fn call_tool(&self, tool_name: &str, args: Map<String, Value>) -> TollgateResult<Value>;

    /// Introspect the server's tools. Servers without introspection return
    /// an empty list.
    async fn list_tools(&self) -> TollgateResult<Vec<McpCapability>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone, Default)]
pub struct HostedMcpOptions {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Defaults to `true`.
    pub require_approval: Option<bool>,
    pub capabilities: Vec<McpCapability>,
}

struct McpBridge {
    server: Arc<dyn McpServer>,
}

#[async_trait]
impl ToolAction for McpBridge {
    async fn execute(&self, mut args: Map<String, Value>, _ctx: &ToolContext<'_>) -> TollgateResult<Value> {
        let tool_name = match args.get("toolName").and_then(Value::as_str) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                return Err(TollgateError::McpExec {
                    reason: "toolName is required for MCP tool execution".to_string(),
                })
            }
        };
        let tool_args = match args.remove("args") {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        self.server.call_tool(&tool_name, tool_args).await
    }
}

/// Wrap an MCP server into an `mcp` tool.
///
/// The tool takes `{ "toolName": string, "args": object }` and forwards the
/// call to the server.
pub fn hosted_mcp_tool(server: Arc<dyn McpServer>, options: HostedMcpOptions) -> TollgateResult<Tool> {
    let url = server.url().trim().to_string();
    if url.is_empty() {
        return Err(TollgateError::McpUnreachable {
            reason: "MCP server url is required".to_string(),
        });
    }

    let server_id = server.id().unwrap_or(url.as_str()).to_string();
    let name = options
        .name
        .unwrap_or_else(|| format!("mcp.{}", server.id().unwrap_or("server")));
    let description = options
        .description
        .unwrap_or_else(|| format!("MCP bridge for {}", url));

    let spec = ToolSpec::Mcp(McpMetadata {
        server_id,
        server_url: Some(url),
        require_approval: options.require_approval.unwrap_or(true),
        capabilities: options.capabilities,
    });

    Ok(Tool::new(name, description, spec, Arc::new(McpBridge { server })).with_parameters(json!({
        "type": "object",
        "properties": {
            "toolName": { "type": "string" },
            "args": { "type": "object" }
        },
        "required": ["toolName"]
    })))
}

/// Like `hosted_mcp_tool`, but fills empty `capabilities` from the server's
/// `list_tools`.
///
/// A failed introspection is logged and leaves the capabilities empty; the
/// capability snapshot then falls back to a synthetic entry for the tool.
pub async fn discover_mcp_tool(server: Arc<dyn McpServer>, mut options: HostedMcpOptions) -> TollgateResult<Tool> {
    if options.capabilities.is_empty() {
        match server.list_tools().await {
            Ok(capabilities) => {
                debug!(url = %server.url(), discovered = capabilities.len(), "mcp tools listed");
                options.capabilities = capabilities;
            }
            Err(e) => warn!(url = %server.url(), error = %e, "mcp tools/list failed"),
        }
    }
    hosted_mcp_tool(server, options)
}

// ── Skills ───────────────────────────────────────────────────────────────────

/// How a skill is exposed to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillMode {
    #[default]
    FunctionTool,
    Instruction,
}

impl SkillMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FunctionTool => "function_tool",
            Self::Instruction => "instruction",
        }
    }
}

/// A parsed skill definition. Loading manifests from disk is up to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillManifest {
    pub skill_id: String,
    pub name: String,
    pub overview: String,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub input_schema: Option<Value>,
    #[serde(default)]
    pub mode: SkillMode,
}

struct SkillAction {
    skill_id: String,
    mode: SkillMode,
}

#[async_trait]
impl ToolAction for SkillAction {
    async fn execute(&self, args: Map<String, Value>, _ctx: &ToolContext<'_>) -> TollgateResult<Value> {
        Ok(json!({
            "skill_id": self.skill_id,
            "mode": self.mode.as_str(),
            "args": args,
        }))
    }
}

/// Turn a skill manifest into a `skill.<id>` tool.
///
/// Executing the tool echoes the skill id, mode and arguments back; the model
/// is expected to follow the skill's instructions itself.
pub fn skill_tool(manifest: SkillManifest) -> TollgateResult<Tool> {
    if manifest.skill_id.trim().is_empty() {
        return Err(TollgateError::SkillSchema {
            reason: "skill_id is required".to_string(),
        });
    }
    if manifest.overview.trim().is_empty() {
        return Err(TollgateError::SkillSchema {
            reason: format!("skill '{}' requires an overview", manifest.skill_id),
        });
    }

    let spec = ToolSpec::Skill(SkillMetadata {
        skill_id: Some(manifest.skill_id.clone()),
        overview: Some(manifest.overview.clone()),
        constraints: manifest.constraints,
        tags: manifest.tags,
    });
    let action = SkillAction {
        skill_id: manifest.skill_id.clone(),
        mode: manifest.mode,
    };

    let mut tool = Tool::new(
        format!("skill.{}", manifest.skill_id),
        manifest.overview,
        spec,
        Arc::new(action),
    );
    tool.parameters = manifest.input_schema;
    tool.metadata.insert("name".to_string(), Value::String(manifest.name));
    Ok(tool)
}
