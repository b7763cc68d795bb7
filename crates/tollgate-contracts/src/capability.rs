//! Capability snapshot types.
//!
//! A `CapabilitySnapshot` is a point-in-time summary of what an agent's tools
//! can do. The safety gate derives one on every authorization check and hands
//! it to the evaluator as context. Snapshots are never persisted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kind of a tool in an agent's catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Function,
    Mcp,
    Skill,
    Introspection,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Mcp => "mcp",
            Self::Skill => "skill",
            Self::Introspection => "introspection",
        }
    }

    /// The kind the gate and policy scopes reason about. Introspection tools
    /// are plain functions from an authorization point of view.
    pub fn gate_kind(&self) -> ToolKind {
        match self {
            Self::Introspection => Self::Function,
            other => *other,
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One operation an MCP server exposes, with a 1–5 risk hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpCapability {
    pub name: String,
    pub description: String,
    pub risk_level: u8,
}

impl McpCapability {
    pub fn new(name: impl Into<String>, description: impl Into<String>, risk_level: u8) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            risk_level: risk_level.clamp(1, 5),
        }
    }
}

/// Skill-specific details of a catalog entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// One entry of the tool catalog carried in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCapability {
    pub name: String,
    pub kind: ToolKind,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill: Option<SkillSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_capabilities: Option<Vec<McpCapability>>,
}

/// Structured summary of an agent's tool catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilitySnapshot {
    pub agent_name: String,
    /// Every tool name, in catalog order.
    pub tool_names: Vec<String>,
    /// Distinct skill ids, in first-seen order.
    pub skill_ids: Vec<String>,
    /// Declared MCP capabilities of every MCP tool, flattened.
    pub mcp_capabilities: Vec<McpCapability>,
    pub tool_catalog: Vec<ToolCapability>,
}

impl CapabilitySnapshot {
    /// Find the catalog entry for `tool_name`, if any.
    pub fn find_tool(&self, tool_name: &str) -> Option<&ToolCapability> {
        self.tool_catalog.iter().find(|t| t.name == tool_name)
    }
}
