//! Runtime error types for the Tollgate run pipeline.
//!
//! All fallible operations return `TollgateResult<T>`. Every variant carries a
//! stable code (`TollgateError::code`) and a coarse `ErrorCategory` that is
//! derived from the code string. Categories exist for routing and telemetry;
//! the runner never branches on them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix shared by every error code.
pub const CODE_PREFIX: &str = "TOLLGATE-E-";

/// Coarse classification of an error, inferred from its code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Provider,
    Safety,
    Approval,
    Skills,
    Mcp,
    Runner,
    Policy,
    Unknown,
}

impl ErrorCategory {
    /// Classify a code string. The order of checks matters: a code such as
    /// `TOLLGATE-E-RUNNER-AUDIT` is a runner error, while
    /// `TOLLGATE-E-GATE-DENIED` is a safety error. The `TOLLGATE-E-` prefix is
    /// ignored, since it would otherwise match `GATE`.
    pub fn from_code(code: &str) -> Self {
        let code = code.strip_prefix(CODE_PREFIX).unwrap_or(code);
        if code.contains("PROVIDER") {
            Self::Provider
        } else if code.contains("GATE") || code.contains("GUARDRAIL") || code.contains("CAPABILITY") {
            Self::Safety
        } else if code.contains("APPROVAL") || code.contains("RESUME") {
            Self::Approval
        } else if code.contains("SKILL") || code.contains("TOOL-NOT-FOUND") {
            Self::Skills
        } else if code.contains("MCP") {
            Self::Mcp
        } else if code.contains("POLICY") {
            Self::Policy
        } else if code.contains("RUNNER") || code.contains("RUN") {
            Self::Runner
        } else {
            Self::Unknown
        }
    }
}

/// The unified error type for the Tollgate runtime.
#[derive(Debug, Error)]
pub enum TollgateError {
    /// The runner, an agent, or a tool was constructed with missing or invalid fields.
    #[error("runner configuration error: {reason}")]
    RunnerConfig { reason: String },

    /// The orchestration loop reached a state it cannot continue from.
    #[error("runner error: {reason}")]
    Runner { reason: String },

    /// A tool action returned a failure.
    #[error("tool '{tool}' failed: {reason}")]
    ToolExecution { tool: String, reason: String },

    /// The audit writer could not persist a run record.
    ///
    /// Fatal: a step that cannot be journaled does not proceed.
    #[error("audit write failed: {reason}")]
    AuditWriteFailed { reason: String },

    /// A guardrail handler denied the run at one of its stages.
    #[error("guardrail denied: {reason}")]
    GuardrailDenied { reason: String },

    /// The safety gate, or a human reviewer, denied a tool call.
    #[error("gate denied tool call: {reason}")]
    GateDenied { reason: String },

    /// The safety evaluator failed or produced a decision that violates the
    /// structured-output contract. Always treated as a denial.
    #[error("gate evaluation failed: {reason}")]
    GateEvaluation { reason: String },

    /// The agent's capability snapshot could not be derived.
    #[error("capability snapshot could not be resolved: {reason}")]
    CapabilityResolve { reason: String },

    /// The requested policy profile does not exist.
    #[error("unknown policy profile: {name}")]
    PolicyInvalid { name: String },

    /// A policy document could not be read or parsed.
    #[error("policy configuration error: {reason}")]
    PolicyConfig { reason: String },

    /// No approval request exists with this id.
    #[error("approval not found: {approval_id}")]
    ApprovalNotFound { approval_id: String },

    /// The approval request cannot accept this operation (e.g. already decided).
    #[error("approval invalid: {reason}")]
    ApprovalInvalid { reason: String },

    /// A resume token was missing, bound to another run, already used, or expired.
    #[error("resume token rejected: {reason}")]
    ResumeToken { reason: String },

    /// The agent has no tool with the requested name.
    #[error("tool not found: {name}")]
    ToolNotFound { name: String },

    /// A tool or skill definition is malformed.
    #[error("skill schema error: {reason}")]
    SkillSchema { reason: String },

    /// An MCP server is not configured or cannot be reached.
    #[error("mcp server unreachable: {reason}")]
    McpUnreachable { reason: String },

    /// An MCP call was rejected before reaching the server.
    #[error("mcp execution error: {reason}")]
    McpExec { reason: String },

    /// The model boundary returned a failure.
    #[error("model error: {reason}")]
    Model { reason: String },
}

impl TollgateError {
    /// Stable, machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RunnerConfig { .. } => "TOLLGATE-E-RUNNER-CONFIG",
            Self::Runner { .. } => "TOLLGATE-E-RUNNER",
            Self::ToolExecution { .. } => "TOLLGATE-E-RUNNER-TOOL-EXEC",
            Self::AuditWriteFailed { .. } => "TOLLGATE-E-RUNNER-AUDIT",
            Self::GuardrailDenied { .. } => "TOLLGATE-E-GUARDRAIL-DENIED",
            Self::GateDenied { .. } => "TOLLGATE-E-GATE-DENIED",
            Self::GateEvaluation { .. } => "TOLLGATE-E-GATE-EVAL",
            Self::CapabilityResolve { .. } => "TOLLGATE-E-AGENT-CAPABILITY-RESOLVE",
            Self::PolicyInvalid { .. } => "TOLLGATE-E-POLICY-INVALID",
            Self::PolicyConfig { .. } => "TOLLGATE-E-POLICY-CONFIG",
            Self::ApprovalNotFound { .. } => "TOLLGATE-E-APPROVAL-NOT-FOUND",
            Self::ApprovalInvalid { .. } => "TOLLGATE-E-APPROVAL-INVALID",
            Self::ResumeToken { .. } => "TOLLGATE-E-RESUME-TOKEN",
            Self::ToolNotFound { .. } => "TOLLGATE-E-TOOL-NOT-FOUND",
            Self::SkillSchema { .. } => "TOLLGATE-E-SKILL-SCHEMA",
            Self::McpUnreachable { .. } => "TOLLGATE-E-MCP-UNREACHABLE",
            Self::McpExec { .. } => "TOLLGATE-E-MCP-EXEC",
            Self::Model { .. } => "TOLLGATE-E-PROVIDER-MODEL",
        }
    }

    /// Coarse category, derived from `code()`.
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(self.code())
    }

    pub fn runner(reason: impl Into<String>) -> Self {
        Self::Runner { reason: reason.into() }
    }

    pub fn gate_evaluation(reason: impl Into<String>) -> Self {
        Self::GateEvaluation { reason: reason.into() }
    }

    pub fn resume_token(reason: impl Into<String>) -> Self {
        Self::ResumeToken { reason: reason.into() }
    }
}

/// Convenience alias used throughout the Tollgate crates.
pub type TollgateResult<T> = Result<T, TollgateError>;
