//! Capability snapshot derivation.
//!
//! The gate re-derives the snapshot from the agent on every authorization
//! check. Derivation is pure: the same agent always yields the same snapshot,
//! so nothing is cached.

use tollgate_contracts::{
    capability::{CapabilitySnapshot, McpCapability, SkillSummary, ToolCapability},
    error::{TollgateError, TollgateResult},
};
use tollgate_core::agent::{Agent, Tool, ToolSpec};

/// Risk assigned to an MCP tool that declares no capabilities.
pub const UNDECLARED_MCP_RISK: u8 = 3;

/// Summarize what `agent`'s tools can do.
///
/// Fails with `CapabilityResolve` if any tool has a blank name.
pub fn derive_capability_snapshot(agent: &Agent) -> TollgateResult<CapabilitySnapshot> {
    let mut skill_ids: Vec<String> = Vec::new();
    let mut mcp_capabilities = Vec::new();
    let mut tool_catalog = Vec::with_capacity(agent.tools().len());

    for tool in agent.tools() {
        if tool.name.trim().is_empty() {
            return Err(TollgateError::CapabilityResolve {
                reason: format!("agent '{}' has a tool without a name", agent.name()),
            });
        }

        match &tool.spec {
            ToolSpec::Skill(skill) => {
                if let Some(id) = &skill.skill_id {
                    if !skill_ids.contains(id) {
                        skill_ids.push(id.clone());
                    }
                }
            }
            ToolSpec::Mcp(mcp) if mcp.capabilities.is_empty() => {
                mcp_capabilities.push(McpCapability::new(
                    tool.name.clone(),
                    tool.description.clone(),
                    UNDECLARED_MCP_RISK,
                ));
            }
            ToolSpec::Mcp(mcp) => mcp_capabilities.extend(mcp.capabilities.iter().cloned()),
            ToolSpec::Function | ToolSpec::Introspection => {}
        }

        tool_catalog.push(catalog_entry(tool));
    }

    Ok(CapabilitySnapshot {
        agent_name: agent.name().to_string(),
        tool_names: agent.tools().iter().map(|t| t.name.clone()).collect(),
        skill_ids,
        mcp_capabilities,
        tool_catalog,
    })
}

/// The catalog entry for one tool. MCP entries carry the declared
/// capabilities only, without the synthetic fallback.
fn catalog_entry(tool: &Tool) -> ToolCapability {
    let skill = tool.skill().map(|skill| SkillSummary {
        skill_id: skill.skill_id.clone(),
        overview: skill.overview.clone(),
        constraints: non_empty(&skill.constraints),
        tags: non_empty(&skill.tags),
    });

    ToolCapability {
        name: tool.name.clone(),
        kind: tool.kind(),
        description: tool.description.clone(),
        parameters_schema: tool.parameters.clone(),
        skill,
        mcp_capabilities: tool.mcp().map(|mcp| mcp.capabilities.clone()),
    }
}

fn non_empty(values: &[String]) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values.to_vec())
    }
}
