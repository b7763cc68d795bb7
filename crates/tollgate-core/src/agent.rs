//! Agents and their tool catalog.
//!
//! A `Tool` is a shared core (name, description, parameter schema, action)
//! plus a `ToolSpec` carrying the kind-specific payload. Skill and MCP
//! payloads can be built directly or extracted from a raw JSON metadata map,
//! which is how tools coming from external loaders describe themselves.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use tollgate_contracts::{
    capability::{McpCapability, ToolKind},
    error::{TollgateError, TollgateResult},
};

use crate::{
    guardrail::Guardrails,
    traits::{Model, ToolAction, ToolContext},
};

/// Skill metadata carried by `skill` tools.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillMetadata {
    pub skill_id: Option<String>,
    pub overview: Option<String>,
    pub constraints: Vec<String>,
    pub tags: Vec<String>,
}

impl SkillMetadata {
    /// Extract skill metadata from a raw map. Accepts `skill_id` or `skillId`.
    pub fn from_metadata(metadata: &Map<String, Value>) -> Self {
        Self {
            skill_id: read_string(metadata, "skill_id").or_else(|| read_string(metadata, "skillId")),
            overview: read_string(metadata, "skill_overview"),
            constraints: read_string_array(metadata, "skill_constraints"),
            tags: read_string_array(metadata, "skill_tags"),
        }
    }
}

/// MCP bridge metadata carried by `mcp` tools.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpMetadata {
    pub server_id: String,
    pub server_url: Option<String>,
    pub require_approval: bool,
    /// Declared capabilities. May be empty.
    pub capabilities: Vec<McpCapability>,
}

impl McpMetadata {
    /// Extract MCP metadata from a raw map.
    ///
    /// Capability entries missing a string `name`, a string `description` or a
    /// numeric `risk_level` are skipped. Risk levels are floored and clamped
    /// into 1..=5.
    pub fn from_metadata(metadata: &Map<String, Value>) -> Self {
        let capabilities = metadata
            .get("capabilities")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(parse_capability).collect())
            .unwrap_or_default();

        Self {
            server_id: read_string(metadata, "server_id").unwrap_or_default(),
            server_url: read_string(metadata, "server_url"),
            require_approval: metadata
                .get("require_approval")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            capabilities,
        }
    }
}

fn parse_capability(item: &Value) -> Option<McpCapability> {
    let record = item.as_object()?;
    let name = record.get("name")?.as_str()?;
    let description = record.get("description")?.as_str()?;
    let risk = record.get("risk_level")?.as_f64()?;
    if !risk.is_finite() {
        return None;
    }
    let risk_level = risk.floor().clamp(1.0, 5.0) as u8;
    Some(McpCapability::new(name, description, risk_level))
}

fn read_string(metadata: &Map<String, Value>, key: &str) -> Option<String> {
    metadata
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn read_string_array(metadata: &Map<String, Value>, key: &str) -> Vec<String> {
    metadata
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Kind-specific payload of a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolSpec {
    Function,
    Introspection,
    Skill(SkillMetadata),
    Mcp(McpMetadata),
}

impl ToolSpec {
    pub fn kind(&self) -> ToolKind {
        match self {
            Self::Function => ToolKind::Function,
            Self::Introspection => ToolKind::Introspection,
            Self::Skill(_) => ToolKind::Skill,
            Self::Mcp(_) => ToolKind::Mcp,
        }
    }

    /// Build the payload for `kind` from a raw metadata map.
    pub fn from_metadata(kind: ToolKind, metadata: &Map<String, Value>) -> Self {
        match kind {
            ToolKind::Function => Self::Function,
            ToolKind::Introspection => Self::Introspection,
            ToolKind::Skill => Self::Skill(SkillMetadata::from_metadata(metadata)),
            ToolKind::Mcp => Self::Mcp(McpMetadata::from_metadata(metadata)),
        }
    }
}

/// A callable tool in an agent's catalog.
#[derive(Clone)]
pub struct Tool {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments, if declared.
    pub parameters: Option<Value>,
    pub spec: ToolSpec,
    /// Free-form metadata not covered by `spec`.
    pub metadata: Map<String, Value>,
    action: Arc<dyn ToolAction>,
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        spec: ToolSpec,
        action: Arc<dyn ToolAction>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: None,
            spec,
            metadata: Map::new(),
            action,
        }
    }

    /// Build a tool whose kind-specific payload is read from `metadata`.
    pub fn from_metadata(
        name: impl Into<String>,
        description: impl Into<String>,
        kind: ToolKind,
        metadata: Map<String, Value>,
        action: Arc<dyn ToolAction>,
    ) -> Self {
        let spec = ToolSpec::from_metadata(kind, &metadata);
        Self {
            metadata,
            ..Self::new(name, description, spec, action)
        }
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn kind(&self) -> ToolKind {
        self.spec.kind()
    }

    pub fn skill(&self) -> Option<&SkillMetadata> {
        match &self.spec {
            ToolSpec::Skill(skill) => Some(skill),
            _ => None,
        }
    }

    pub fn mcp(&self) -> Option<&McpMetadata> {
        match &self.spec {
            ToolSpec::Mcp(mcp) => Some(mcp),
            _ => None,
        }
    }

    /// Invoke the tool's action.
    pub async fn execute(&self, args: Map<String, Value>, ctx: &ToolContext<'_>) -> TollgateResult<Value> {
        self.action.execute(args, ctx).await
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

/// An immutable agent definition. The runner never mutates it.
pub struct Agent {
    name: String,
    instructions: String,
    tools: Vec<Tool>,
    model: Option<Arc<dyn Model>>,
    guardrails: Guardrails,
}

impl Agent {
    pub fn builder(name: impl Into<String>, instructions: impl Into<String>) -> AgentBuilder {
        AgentBuilder {
            name: name.into(),
            instructions: instructions.into(),
            tools: Vec::new(),
            model: None,
            guardrails: Guardrails::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn model(&self) -> Option<&Arc<dyn Model>> {
        self.model.as_ref()
    }

    pub fn guardrails(&self) -> &Guardrails {
        &self.guardrails
    }

    pub fn find_tool(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.name == name)
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("tools", &self.tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>())
            .field("model", &self.model.as_ref().map(|m| m.name().to_string()))
            .finish_non_exhaustive()
    }
}

pub struct AgentBuilder {
    name: String,
    instructions: String,
    tools: Vec<Tool>,
    model: Option<Arc<dyn Model>>,
    guardrails: Guardrails,
}

impl AgentBuilder {
    pub fn tool(mut self, tool: Tool) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: impl IntoIterator<Item = Tool>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn model(mut self, model: Arc<dyn Model>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn guardrails(mut self, guardrails: Guardrails) -> Self {
        self.guardrails = guardrails;
        self
    }

    /// Validate and build the agent.
    ///
    /// Name and instructions must be non-blank and tool names must be unique.
    /// Blank tool names are left for the capability snapshot to reject.
    pub fn build(self) -> TollgateResult<Agent> {
        if self.name.trim().is_empty() {
            return Err(TollgateError::RunnerConfig {
                reason: "agent name is required".to_string(),
            });
        }
        if self.instructions.trim().is_empty() {
            return Err(TollgateError::RunnerConfig {
                reason: format!("agent '{}' requires instructions", self.name),
            });
        }

        let mut seen = HashSet::new();
        for tool in &self.tools {
            if !tool.name.is_empty() && !seen.insert(tool.name.as_str()) {
                return Err(TollgateError::RunnerConfig {
                    reason: format!("agent '{}' declares tool '{}' more than once", self.name, tool.name),
                });
            }
        }

        Ok(Agent {
            name: self.name,
            instructions: self.instructions,
            tools: self.tools,
            model: self.model,
            guardrails: self.guardrails,
        })
    }
}
