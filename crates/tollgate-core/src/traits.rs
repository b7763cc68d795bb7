//! Trait boundaries of the Tollgate run pipeline.
//!
//! - `ToolAction`:      untrusted side effects (local code, MCP bridges, skills)
//! - `Model`:           untrusted planner (usually an LLM behind HTTP)
//! - `SafetyEvaluator`: pluggable judgment whose output is never trusted as-is
//! - `ToolGate`:        trusted gate; validates the evaluator and applies policy
//! - `PolicyStore`:     read-mostly source of policy profiles
//! - `AuditWriter`:     trusted sink recording every run event
//!
//! The runner wires them together. A tool action is never invoked for a call
//! the gate did not allow, unless a human approved that exact call.

use async_trait::async_trait;
use serde_json::{Map, Value};

use tollgate_contracts::{
    agent::RunId,
    error::TollgateResult,
    execution::{RequestedToolCall, RunRecord, ToolCallResult},
    policy::{GateDecision, PolicyProfile, RawDecision, ToolCallRequest},
};

use crate::agent::Agent;

/// Context handed to a tool action alongside its arguments.
#[derive(Debug, Clone, Copy)]
pub struct ToolContext<'a> {
    pub run_id: &'a RunId,
    pub agent: &'a Agent,
    pub input_text: &'a str,
}

/// The executable part of a tool.
///
/// Failures should be reported as `TollgateError::ToolExecution` unless a more
/// specific variant (e.g. `McpExec`) applies. The runner passes the returned
/// value through verbatim.
#[async_trait]
pub trait ToolAction: Send + Sync {
    async fn execute(&self, args: Map<String, Value>, ctx: &ToolContext<'_>) -> TollgateResult<Value>;
}

/// One planning request to the agent's model.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub agent: &'a Agent,
    pub input_text: &'a str,
    /// Tool calls executed so far in this run, in execution order.
    pub tool_calls: &'a [ToolCallResult],
    pub stream: bool,
}

/// What the model answered. An empty `tool_calls` list means the model has
/// reached its final answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub output_text: Option<String>,
    pub tool_calls: Vec<RequestedToolCall>,
}

impl ModelResponse {
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            output_text: Some(output.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn plan(tool_calls: Vec<RequestedToolCall>) -> Self {
        Self {
            output_text: None,
            tool_calls,
        }
    }
}

/// The reasoning model boundary.
///
/// Network timeouts and provider errors belong to implementations; they should
/// surface as `TollgateError::Model`.
#[async_trait]
pub trait Model: Send + Sync {
    /// Human-readable identifier, used in logs.
    fn name(&self) -> &str;

    async fn generate(&self, request: ModelRequest<'_>) -> TollgateResult<ModelResponse>;
}

/// Pluggable authorization judgment for one tool call.
///
/// The request arrives enriched with the capability snapshot, the tool catalog
/// and the target tool entry. Any `Err`, and any returned decision outside the
/// structured-output contract, is turned into a denial by the gate.
#[async_trait]
pub trait SafetyEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        agent: &Agent,
        request: &ToolCallRequest,
        profile: &PolicyProfile,
    ) -> TollgateResult<RawDecision>;
}

/// The trusted gate the runner consults before every tool call.
#[async_trait]
pub trait ToolGate: Send + Sync {
    /// Produce a validated decision for `request` under the named profile.
    ///
    /// An unknown profile name is a configuration error and must be returned
    /// as `TollgateError::PolicyInvalid`.
    async fn evaluate(
        &self,
        agent: &Agent,
        request: ToolCallRequest,
        profile_name: &str,
    ) -> TollgateResult<GateDecision>;
}

/// Source of named policy profiles. Shared read-mostly across runs.
pub trait PolicyStore: Send + Sync {
    fn profile(&self, name: &str) -> TollgateResult<PolicyProfile>;

    /// Add or replace a profile.
    fn set_profile(&self, profile: PolicyProfile) -> TollgateResult<()>;
}

/// The audit writer: the immutable journal of run events.
///
/// A failed write is fatal to the step that produced the record.
pub trait AuditWriter: Send + Sync {
    /// Append one run record. Implementations must treat this as append-only.
    fn write(&self, record: &RunRecord) -> TollgateResult<()>;

    /// Mark a run as complete in the journal.
    fn finalize(&self, run_id: &RunId) -> TollgateResult<()>;
}
