//! Run-level results and audit records.
//!
//! `RunResult` is what the runner returns to the caller after `run` or
//! `resume_run`. `RunRecord` is what gets written to the audit journal, one
//! per significant event of a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    agent::{ApprovalId, InputItem, RunId},
    approval::{ApprovalDecision, HumanApprovalRequest},
    capability::ToolKind,
    policy::GateDecision,
};

/// A tool call the caller or the model asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestedToolCall {
    pub tool_name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_intent: Option<String>,
}

impl RequestedToolCall {
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            args: Map::new(),
            user_intent: None,
        }
    }

    /// Set the arguments from a JSON value. Anything but an object leaves the
    /// arguments empty.
    pub fn with_args(mut self, args: Value) -> Self {
        self.args = match args {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self
    }

    pub fn with_user_intent(mut self, intent: impl Into<String>) -> Self {
        self.user_intent = Some(intent.into());
        self
    }
}

/// The result of one executed tool call. `output` is opaque to the runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub tool_name: String,
    pub tool_kind: ToolKind,
    pub args: Map<String, Value>,
    pub output: Value,
}

/// How a suspended run was being driven when it paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Continuation {
    /// An explicit list of tool calls supplied by the caller.
    Manual,
    /// Tool calls planned turn by turn by the agent's model.
    Model,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UsageStats {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl UsageStats {
    /// Rough estimate: one token per four characters, at least one each way.
    pub fn estimate(input_text: &str, output_text: &str) -> Self {
        let input_tokens = approx_tokens(input_text);
        let output_tokens = approx_tokens(output_text);
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}

fn approx_tokens(text: &str) -> u64 {
    let chars = text.chars().count() as u64;
    chars.div_ceil(4).max(1)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunExtensions {
    pub policy_profile: String,
    pub interrupted: bool,
}

/// The outcome of `run` or `resume_run`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: RunId,
    pub output_text: String,
    pub messages: Vec<InputItem>,
    pub tool_calls: Vec<ToolCallResult>,
    pub usage: UsageStats,
    /// Non-empty only when the run is suspended.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interruptions: Vec<HumanApprovalRequest>,
    pub extensions: RunExtensions,
}

impl RunResult {
    pub fn is_interrupted(&self) -> bool {
        self.extensions.interrupted
    }
}

/// What happened at one point of a run, as recorded in the audit journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    /// The safety gate produced a decision for a tool call.
    GateEvaluated { tool_name: String, decision: GateDecision },
    /// The run paused waiting for a human.
    Suspended { tool_name: String, approval_id: ApprovalId },
    /// A reviewer decided an approval request.
    ApprovalSubmitted { approval_id: ApprovalId, decision: ApprovalDecision },
    /// A resume token was consumed and the run continued (or was dropped on deny).
    Resumed { approval_id: ApprovalId, decision: ApprovalDecision },
    /// A tool action ran to completion.
    ToolExecuted { tool_name: String, tool_kind: ToolKind },
    /// The run produced its final output.
    Completed { tool_call_count: usize },
}

/// An immutable record of one run event, written to the audit journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub event: RunEvent,
    pub timestamp: DateTime<Utc>,
}

impl RunRecord {
    pub fn now(run_id: &RunId, event: RunEvent) -> Self {
        Self {
            run_id: run_id.clone(),
            event,
            timestamp: Utc::now(),
        }
    }
}

/// Everything needed to continue a suspended run, as plain data.
///
/// The runner keeps one of these per suspended run id next to the agent
/// handle. `executed_calls` holds the calls that ran before the pause,
/// `awaiting_call` the call that triggered it, and `pending_calls` the rest of
/// the batch in its original order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunContinuation {
    pub input_text: String,
    pub policy_profile: String,
    pub awaiting_call: RequestedToolCall,
    pub pending_calls: Vec<RequestedToolCall>,
    pub executed_calls: Vec<ToolCallResult>,
    pub continuation: Continuation,
    pub remaining_model_turns: u32,
    pub require_human_approval: bool,
    pub stream: bool,
    pub approval_id: ApprovalId,
    /// The gate decision that caused the pause; reused when an approval is reissued.
    pub gate_decision: GateDecision,
}
