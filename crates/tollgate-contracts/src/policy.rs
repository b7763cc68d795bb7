//! Policy profile, tool-call request, and gate decision types.
//!
//! The safety evaluator produces an untrusted `RawDecision`. The safety gate
//! validates it and turns it into a `GateDecision`, which is the only shape
//! the runner acts on.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    agent::ApprovalId,
    capability::{CapabilitySnapshot, ToolCapability, ToolKind},
};

/// How strictly a profile escalates allowed calls to a human.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    /// Every allowed call still needs human sign-off.
    Always,
    /// High-risk calls, and MCP tools that ask for it, need sign-off.
    RiskBased,
    /// The evaluator's decision stands.
    Never,
}

/// A named bundle of authorization defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyProfile {
    pub name: String,
    pub approval_mode: ApprovalMode,
    /// Tool kinds this profile lets through. Only `function`, `skill` and
    /// `mcp` are meaningful; introspection tools are scoped as functions.
    pub allowed_tool_scopes: Vec<ToolKind>,
}

impl PolicyProfile {
    pub fn new(name: impl Into<String>, approval_mode: ApprovalMode) -> Self {
        Self {
            name: name.into(),
            approval_mode,
            allowed_tool_scopes: vec![ToolKind::Function, ToolKind::Skill, ToolKind::Mcp],
        }
    }

    pub fn allows_scope(&self, kind: ToolKind) -> bool {
        self.allowed_tool_scopes.contains(&kind.gate_kind())
    }
}

/// A tool call as presented to the safety gate and evaluator.
///
/// The runner fills the first four fields; the gate fills the context fields
/// before the evaluator sees the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub tool_name: String,
    pub tool_kind: ToolKind,
    pub args: Map<String, Value>,
    pub user_intent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability_snapshot: Option<CapabilitySnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_catalog: Option<Vec<ToolCapability>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_tool: Option<ToolCapability>,
}

impl ToolCallRequest {
    pub fn new(
        tool_name: impl Into<String>,
        tool_kind: ToolKind,
        args: Map<String, Value>,
        user_intent: impl Into<String>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            tool_kind: tool_kind.gate_kind(),
            args,
            user_intent: user_intent.into(),
            capability_snapshot: None,
            tool_catalog: None,
            target_tool: None,
        }
    }
}

/// The three outcomes of a gate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecisionKind {
    Allow,
    Deny,
    NeedsHuman,
}

impl GateDecisionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::NeedsHuman => "needs_human",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "allow" => Some(Self::Allow),
            "deny" => Some(Self::Deny),
            "needs_human" => Some(Self::NeedsHuman),
            _ => None,
        }
    }
}

impl std::fmt::Display for GateDecisionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Untrusted decision as returned by a safety evaluator.
///
/// Nothing here is assumed valid. `decision` is a free string and `reason`
/// may be missing; the gate rejects anything outside the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDecision {
    pub decision: String,
    #[serde(default)]
    pub reason: Option<String>,
    pub risk_level: i64,
    #[serde(default)]
    pub policy_ref: Option<String>,
}

impl RawDecision {
    pub fn new(decision: GateDecisionKind, reason: impl Into<String>, risk_level: i64) -> Self {
        Self {
            decision: decision.as_str().to_string(),
            reason: Some(reason.into()),
            risk_level,
            policy_ref: None,
        }
    }

    pub fn allow(reason: impl Into<String>, risk_level: i64) -> Self {
        Self::new(GateDecisionKind::Allow, reason, risk_level)
    }

    pub fn deny(reason: impl Into<String>, risk_level: i64) -> Self {
        Self::new(GateDecisionKind::Deny, reason, risk_level)
    }

    pub fn needs_human(reason: impl Into<String>, risk_level: i64) -> Self {
        Self::new(GateDecisionKind::NeedsHuman, reason, risk_level)
    }

    pub fn with_policy_ref(mut self, policy_ref: impl Into<String>) -> Self {
        self.policy_ref = Some(policy_ref.into());
        self
    }
}

/// A validated, policy-annotated decision for one tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDecision {
    pub decision: GateDecisionKind,
    /// Always within 1..=5.
    pub risk_level: u8,
    /// Never empty.
    pub reason: String,
    pub policy_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_id: Option<ApprovalId>,
}

impl GateDecision {
    /// Escalate an allow to `needs_human`, keeping at least risk level 2.
    pub fn escalate(self, reason: impl Into<String>) -> Self {
        Self {
            decision: GateDecisionKind::NeedsHuman,
            risk_level: self.risk_level.max(2),
            reason: reason.into(),
            ..self
        }
    }
}
