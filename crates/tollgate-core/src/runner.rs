//! The agent runner: the guarded, resumable tool-call loop.
//!
//! Every requested tool call goes through the same pipeline:
//!
//!   tool guardrails → lookup → ToolGate → [escalation] → execute | suspend | fail
//!
//! A tool action is only reachable after the gate allowed the call, or after
//! a human approved that exact call through a resume token. A suspended run
//! is kept as plain data (`RunContinuation`) keyed by run id, so resuming it
//! is a second, independent call rather than a parked future.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use tollgate_contracts::{
    agent::{ApprovalId, InputItem, ResumeTokenId, Role, RunId, RunInput},
    approval::{ApprovalDecision, HumanApprovalRequest, ResumeToken},
    error::{TollgateError, TollgateResult},
    execution::{
        Continuation, RequestedToolCall, RunContinuation, RunEvent, RunExtensions, RunRecord,
        RunResult, ToolCallResult, UsageStats,
    },
    policy::{GateDecision, GateDecisionKind, ToolCallRequest},
};

use crate::{
    agent::{Agent, Tool},
    approval::ApprovalController,
    config::RunnerConfig,
    guardrail::{GuardrailCheck, GuardrailStage},
    traits::{AuditWriter, ModelRequest, ToolContext, ToolGate},
};

pub const PAUSED_OUTPUT_TEXT: &str = "Execution paused. Human approval is required.";
pub const PAUSED_MESSAGE: &str = "Execution paused for approval.";
pub const FORCED_APPROVAL_REASON: &str = "require_human_approval option is enabled.";
pub const HUMAN_DENIED_REASON: &str = "Human denied approval.";

/// Per-run options.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub stream: bool,
    /// Falls back to `RunnerConfig::default_policy_profile`.
    pub policy_profile: Option<String>,
    /// Escalate every allowed call to a human.
    pub require_human_approval: bool,
    /// Explicit calls. When non-empty the model loop is skipped.
    pub tool_calls: Vec<RequestedToolCall>,
    /// Falls back to `RunnerConfig::default_max_turns`.
    pub max_turns: Option<u32>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy_profile(mut self, profile: impl Into<String>) -> Self {
        self.policy_profile = Some(profile.into());
        self
    }

    pub fn with_tool_call(mut self, call: RequestedToolCall) -> Self {
        self.tool_calls.push(call);
        self
    }

    pub fn with_tool_calls(mut self, calls: impl IntoIterator<Item = RequestedToolCall>) -> Self {
        self.tool_calls.extend(calls);
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    pub fn require_human_approval(mut self) -> Self {
        self.require_human_approval = true;
        self
    }

    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }
}

struct SuspendedRun {
    agent: Arc<Agent>,
    continuation: RunContinuation,
}

/// Borrowed view of the parameters shared by every step of one run.
struct RunScope<'a> {
    run_id: &'a RunId,
    agent: &'a Arc<Agent>,
    input_text: &'a str,
    policy_profile: &'a str,
    require_human_approval: bool,
    stream: bool,
}

enum CallOutcome {
    Executed(ToolCallResult),
    Suspended {
        approval: HumanApprovalRequest,
        decision: GateDecision,
    },
}

enum BatchOutcome {
    Drained(Vec<ToolCallResult>),
    Interrupted(RunResult),
}

/// Drives agents through the guarded tool-call loop.
///
/// One runner is meant to be shared (`Arc`) across many concurrent runs. The
/// gate, approval controller and audit writer are shared by all of them; the
/// only per-run state is the suspended-run table.
pub struct AgentRunner {
    gate: Arc<dyn ToolGate>,
    approvals: ApprovalController,
    audit: Option<Arc<dyn AuditWriter>>,
    config: RunnerConfig,
    suspended: Mutex<HashMap<RunId, SuspendedRun>>,
}

impl AgentRunner {
    pub fn new(gate: Arc<dyn ToolGate>, config: RunnerConfig) -> Self {
        Self {
            gate,
            approvals: ApprovalController::with_ttl_secs(config.resume_token_ttl_secs),
            audit: None,
            config,
            suspended: Mutex::new(HashMap::new()),
        }
    }

    /// Journal every run event to `audit`.
    pub fn with_audit(mut self, audit: Arc<dyn AuditWriter>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn approvals(&self) -> &ApprovalController {
        &self.approvals
    }

    // ── Public run surface ───────────────────────────────────────────────────

    /// Start a new run.
    ///
    /// Explicit `tool_calls` take priority over the model loop; with neither,
    /// the run completes immediately.
    pub async fn run(
        &self,
        agent: Arc<Agent>,
        input: impl Into<RunInput>,
        options: RunOptions,
    ) -> TollgateResult<RunResult> {
        let run_id = RunId::new();
        let input_text = input.into().flatten();

        agent
            .guardrails()
            .enforce(&GuardrailCheck {
                stage: GuardrailStage::Input,
                agent: &agent,
                input_text: &input_text,
                requested_call: None,
                final_output: None,
            })
            .await?;

        let policy_profile = options
            .policy_profile
            .unwrap_or_else(|| self.config.default_policy_profile.clone());
        let scope = RunScope {
            run_id: &run_id,
            agent: &agent,
            input_text: &input_text,
            policy_profile: &policy_profile,
            require_human_approval: options.require_human_approval,
            stream: options.stream,
        };

        info!(
            run_id = %run_id,
            agent = %agent.name(),
            profile = %policy_profile,
            tool_calls = options.tool_calls.len(),
            "run started"
        );

        if !options.tool_calls.is_empty() {
            return match self
                .process_calls(&scope, options.tool_calls, Vec::new(), Continuation::Manual, 0)
                .await?
            {
                BatchOutcome::Interrupted(result) => Ok(result),
                BatchOutcome::Drained(calls) => self.complete_run(&scope, calls, None).await,
            };
        }

        if agent.model().is_some() {
            let max_turns = options.max_turns.unwrap_or(self.config.default_max_turns);
            return self.model_loop(&scope, Vec::new(), max_turns).await;
        }

        self.complete_run(&scope, Vec::new(), None).await
    }

    /// Continue a suspended run with the token minted by `submit_approval`.
    ///
    /// Token errors leave the suspended run in place. Once the token is
    /// consumed the run leaves the suspended table: a deny drops it, and an
    /// approve only puts it back if a later call suspends again.
    pub async fn resume_run(&self, run_id: &RunId, token: &ResumeTokenId) -> TollgateResult<RunResult> {
        let approval_id = self
            .lock_suspended()?
            .get(run_id)
            .map(|run| run.continuation.approval_id.clone())
            .ok_or_else(|| TollgateError::runner(format!("no suspended run found: {}", run_id)))?;

        let consumed = self.approvals.consume_resume_token_for(run_id, &approval_id, token)?;
        let SuspendedRun { agent, continuation } = self
            .lock_suspended()?
            .remove(run_id)
            .ok_or_else(|| TollgateError::runner(format!("no suspended run found: {}", run_id)))?;

        self.record(
            run_id,
            RunEvent::Resumed {
                approval_id: consumed.approval_id.clone(),
                decision: consumed.decision,
            },
        )?;

        if consumed.decision == ApprovalDecision::Deny {
            self.finalize(run_id)?;
            warn!(run_id = %run_id, approval_id = %consumed.approval_id, "human denied approval, run dropped");
            return Err(TollgateError::GateDenied {
                reason: HUMAN_DENIED_REASON.to_string(),
            });
        }

        info!(
            run_id = %run_id,
            approval_id = %consumed.approval_id,
            tool = %continuation.awaiting_call.tool_name,
            pending = continuation.pending_calls.len(),
            "resuming approved run"
        );

        let RunContinuation {
            input_text,
            policy_profile,
            awaiting_call,
            pending_calls,
            mut executed_calls,
            continuation: kind,
            remaining_model_turns,
            require_human_approval,
            stream,
            ..
        } = continuation;
        let scope = RunScope {
            run_id,
            agent: &agent,
            input_text: &input_text,
            policy_profile: &policy_profile,
            require_human_approval,
            stream,
        };

        // The human authorized this exact call; it bypasses the gate but not
        // the tool guardrails.
        self.enforce_tool_guardrails(&scope, &awaiting_call).await?;
        let tool = find_tool(&agent, &awaiting_call.tool_name)?;
        executed_calls.push(self.execute_tool(&scope, tool, &awaiting_call).await?);

        match self
            .process_calls(&scope, pending_calls, executed_calls, kind, remaining_model_turns)
            .await?
        {
            BatchOutcome::Interrupted(result) => Ok(result),
            BatchOutcome::Drained(calls) => {
                if kind == Continuation::Model && remaining_model_turns > 0 {
                    self.model_loop(&scope, calls, remaining_model_turns).await
                } else {
                    self.complete_run(&scope, calls, None).await
                }
            }
        }
    }

    /// Open a fresh approval for a suspended run whose approval was granted
    /// but whose resume token expired unused.
    ///
    /// A pending, denied or redeemed approval cannot be reissued.
    pub fn reissue_approval(&self, run_id: &RunId) -> TollgateResult<HumanApprovalRequest> {
        let continuation = self
            .suspended_run(run_id)?
            .ok_or_else(|| TollgateError::runner(format!("no suspended run found: {}", run_id)))?;

        if !self.approvals.approval_lapsed(&continuation.approval_id)? {
            return Err(TollgateError::ApprovalInvalid {
                reason: format!(
                    "approval {} has not lapsed; only an approval whose resume token expired unused can be reissued",
                    continuation.approval_id
                ),
            });
        }

        let decision = GateDecision {
            approval_id: Some(ApprovalId::new()),
            ..continuation.gate_decision
        };
        let request = self.approvals.create_approval_request(
            run_id,
            &decision,
            decision.reason.clone(),
            continuation.awaiting_call.tool_name.clone(),
        )?;

        {
            let mut suspended = self.lock_suspended()?;
            let run = suspended
                .get_mut(run_id)
                .ok_or_else(|| TollgateError::runner(format!("no suspended run found: {}", run_id)))?;
            run.continuation.approval_id = request.approval_id.clone();
            run.continuation.gate_decision = decision;
        }

        self.record(
            run_id,
            RunEvent::Suspended {
                tool_name: request.tool_name.clone(),
                approval_id: request.approval_id.clone(),
            },
        )?;
        info!(run_id = %run_id, approval_id = %request.approval_id, "approval reissued");
        Ok(request)
    }

    pub fn pending_approvals(&self, run_id: Option<&RunId>) -> TollgateResult<Vec<HumanApprovalRequest>> {
        self.approvals.pending_approvals(run_id)
    }

    pub fn submit_approval(
        &self,
        approval_id: &ApprovalId,
        decision: ApprovalDecision,
        comment: Option<String>,
    ) -> TollgateResult<ResumeToken> {
        let token = self.approvals.submit_approval(approval_id, decision, comment)?;
        self.record(
            &token.run_id,
            RunEvent::ApprovalSubmitted {
                approval_id: approval_id.clone(),
                decision,
            },
        )?;
        Ok(token)
    }

    /// Submit a decision and immediately resume with the minted token.
    /// `decision` defaults to approve.
    pub async fn approve_and_resume(
        &self,
        run_id: &RunId,
        approval_id: &ApprovalId,
        decision: Option<ApprovalDecision>,
        comment: Option<String>,
    ) -> TollgateResult<RunResult> {
        let decision = decision.unwrap_or(ApprovalDecision::Approve);
        let token = self.submit_approval(approval_id, decision, comment)?;
        self.resume_run(run_id, &token.token).await
    }

    /// A copy of the continuation stored for a suspended run.
    pub fn suspended_run(&self, run_id: &RunId) -> TollgateResult<Option<RunContinuation>> {
        Ok(self
            .lock_suspended()?
            .get(run_id)
            .map(|run| run.continuation.clone()))
    }

    // ── Pipeline ─────────────────────────────────────────────────────────────

    async fn model_loop(
        &self,
        scope: &RunScope<'_>,
        executed: Vec<ToolCallResult>,
        remaining_turns: u32,
    ) -> TollgateResult<RunResult> {
        let model = scope
            .agent
            .model()
            .cloned()
            .ok_or_else(|| TollgateError::runner("agent model is required in the model loop"))?;
        let mut executed = executed;

        for turn in 0..remaining_turns {
            let response = model
                .generate(ModelRequest {
                    agent: scope.agent,
                    input_text: scope.input_text,
                    tool_calls: &executed,
                    stream: scope.stream,
                })
                .await?;

            debug!(
                run_id = %scope.run_id,
                model = %model.name(),
                turn = turn,
                planned = response.tool_calls.len(),
                "model turn"
            );

            if response.tool_calls.is_empty() {
                let output = response
                    .output_text
                    .unwrap_or_else(|| default_output_text(scope.input_text, &executed));
                return self.complete_run(scope, executed, Some(output)).await;
            }

            let remaining = remaining_turns - (turn + 1);
            match self
                .process_calls(scope, response.tool_calls, executed, Continuation::Model, remaining)
                .await?
            {
                BatchOutcome::Interrupted(result) => return Ok(result),
                BatchOutcome::Drained(calls) => executed = calls,
            }
        }

        Err(TollgateError::runner(
            "model tool loop exceeded max_turns without reaching final output",
        ))
    }

    /// Process `calls` strictly in order. The first call needing a human
    /// suspends the run; later calls are kept verbatim for the resume.
    async fn process_calls(
        &self,
        scope: &RunScope<'_>,
        calls: Vec<RequestedToolCall>,
        mut executed: Vec<ToolCallResult>,
        continuation: Continuation,
        remaining_model_turns: u32,
    ) -> TollgateResult<BatchOutcome> {
        let mut queue = calls.into_iter();

        while let Some(call) = queue.next() {
            match self.check_and_execute(scope, &call).await? {
                CallOutcome::Executed(result) => executed.push(result),
                CallOutcome::Suspended { approval, decision } => {
                    let state = RunContinuation {
                        input_text: scope.input_text.to_string(),
                        policy_profile: scope.policy_profile.to_string(),
                        awaiting_call: call,
                        pending_calls: queue.by_ref().collect(),
                        executed_calls: executed.clone(),
                        continuation,
                        remaining_model_turns,
                        require_human_approval: scope.require_human_approval,
                        stream: scope.stream,
                        approval_id: approval.approval_id.clone(),
                        gate_decision: decision,
                    };

                    info!(
                        run_id = %scope.run_id,
                        approval_id = %approval.approval_id,
                        tool = %approval.tool_name,
                        executed = state.executed_calls.len(),
                        pending = state.pending_calls.len(),
                        "run suspended awaiting approval"
                    );

                    self.lock_suspended()?.insert(
                        scope.run_id.clone(),
                        SuspendedRun {
                            agent: scope.agent.clone(),
                            continuation: state,
                        },
                    );
                    self.record(
                        scope.run_id,
                        RunEvent::Suspended {
                            tool_name: approval.tool_name.clone(),
                            approval_id: approval.approval_id.clone(),
                        },
                    )?;

                    return Ok(BatchOutcome::Interrupted(interrupted_result(
                        scope,
                        executed,
                        vec![approval],
                    )));
                }
            }
        }

        Ok(BatchOutcome::Drained(executed))
    }

    async fn check_and_execute(
        &self,
        scope: &RunScope<'_>,
        call: &RequestedToolCall,
    ) -> TollgateResult<CallOutcome> {
        self.enforce_tool_guardrails(scope, call).await?;
        let tool = find_tool(scope.agent, &call.tool_name)?;

        let request = ToolCallRequest::new(
            tool.name.clone(),
            tool.kind(),
            call.args.clone(),
            call.user_intent
                .clone()
                .unwrap_or_else(|| scope.input_text.to_string()),
        );
        let mut decision = self
            .gate
            .evaluate(scope.agent, request, scope.policy_profile)
            .await?;

        if scope.require_human_approval && decision.decision == GateDecisionKind::Allow {
            decision = decision.escalate(FORCED_APPROVAL_REASON);
        }

        self.record(
            scope.run_id,
            RunEvent::GateEvaluated {
                tool_name: tool.name.clone(),
                decision: decision.clone(),
            },
        )?;

        match decision.decision {
            GateDecisionKind::Deny => {
                warn!(
                    run_id = %scope.run_id,
                    tool = %tool.name,
                    risk_level = decision.risk_level,
                    reason = %decision.reason,
                    "tool call denied"
                );
                Err(TollgateError::GateDenied {
                    reason: decision.reason,
                })
            }
            GateDecisionKind::NeedsHuman => {
                if decision.approval_id.is_none() {
                    decision.approval_id = Some(ApprovalId::new());
                }
                let approval = self.approvals.create_approval_request(
                    scope.run_id,
                    &decision,
                    decision.reason.clone(),
                    tool.name.clone(),
                )?;
                Ok(CallOutcome::Suspended { approval, decision })
            }
            GateDecisionKind::Allow => {
                let result = self.execute_tool(scope, tool, call).await?;
                Ok(CallOutcome::Executed(result))
            }
        }
    }

    async fn enforce_tool_guardrails(&self, scope: &RunScope<'_>, call: &RequestedToolCall) -> TollgateResult<()> {
        scope
            .agent
            .guardrails()
            .enforce(&GuardrailCheck {
                stage: GuardrailStage::Tool,
                agent: scope.agent,
                input_text: scope.input_text,
                requested_call: Some(call),
                final_output: None,
            })
            .await
    }

    async fn execute_tool(
        &self,
        scope: &RunScope<'_>,
        tool: &Tool,
        call: &RequestedToolCall,
    ) -> TollgateResult<ToolCallResult> {
        let ctx = ToolContext {
            run_id: scope.run_id,
            agent: scope.agent,
            input_text: scope.input_text,
        };
        let output = tool.execute(call.args.clone(), &ctx).await?;

        debug!(run_id = %scope.run_id, tool = %tool.name, kind = %tool.kind(), "tool executed");
        self.record(
            scope.run_id,
            RunEvent::ToolExecuted {
                tool_name: tool.name.clone(),
                tool_kind: tool.kind(),
            },
        )?;

        Ok(ToolCallResult {
            tool_name: tool.name.clone(),
            tool_kind: tool.kind(),
            args: call.args.clone(),
            output,
        })
    }

    async fn complete_run(
        &self,
        scope: &RunScope<'_>,
        tool_calls: Vec<ToolCallResult>,
        output_override: Option<String>,
    ) -> TollgateResult<RunResult> {
        let output = match output_override {
            Some(output) => output,
            None => self.generate_output(scope, &tool_calls).await?,
        };

        scope
            .agent
            .guardrails()
            .enforce(&GuardrailCheck {
                stage: GuardrailStage::Output,
                agent: scope.agent,
                input_text: scope.input_text,
                requested_call: None,
                final_output: Some(&output),
            })
            .await?;

        self.record(
            scope.run_id,
            RunEvent::Completed {
                tool_call_count: tool_calls.len(),
            },
        )?;
        self.finalize(scope.run_id)?;

        info!(run_id = %scope.run_id, tool_calls = tool_calls.len(), "run completed");

        Ok(RunResult {
            run_id: scope.run_id.clone(),
            messages: vec![InputItem::new(Role::Assistant, output.clone())],
            usage: UsageStats::estimate(scope.input_text, &output),
            output_text: output,
            tool_calls,
            interruptions: Vec::new(),
            extensions: RunExtensions {
                policy_profile: scope.policy_profile.to_string(),
                interrupted: false,
            },
        })
    }

    async fn generate_output(&self, scope: &RunScope<'_>, tool_calls: &[ToolCallResult]) -> TollgateResult<String> {
        match scope.agent.model() {
            Some(model) => {
                let response = model
                    .generate(ModelRequest {
                        agent: scope.agent,
                        input_text: scope.input_text,
                        tool_calls,
                        stream: scope.stream,
                    })
                    .await?;
                Ok(response
                    .output_text
                    .unwrap_or_else(|| default_output_text(scope.input_text, tool_calls)))
            }
            None => Ok(default_output_text(scope.input_text, tool_calls)),
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────────────

    fn lock_suspended(&self) -> TollgateResult<MutexGuard<'_, HashMap<RunId, SuspendedRun>>> {
        self.suspended
            .lock()
            .map_err(|e| TollgateError::runner(format!("suspended run table lock poisoned: {}", e)))
    }

    fn record(&self, run_id: &RunId, event: RunEvent) -> TollgateResult<()> {
        match &self.audit {
            Some(audit) => audit.write(&RunRecord::now(run_id, event)),
            None => Ok(()),
        }
    }

    fn finalize(&self, run_id: &RunId) -> TollgateResult<()> {
        match &self.audit {
            Some(audit) => audit.finalize(run_id),
            None => Ok(()),
        }
    }
}

fn find_tool<'a>(agent: &'a Agent, name: &str) -> TollgateResult<&'a Tool> {
    agent.find_tool(name).ok_or_else(|| TollgateError::ToolNotFound {
        name: name.to_string(),
    })
}

fn default_output_text(input_text: &str, tool_calls: &[ToolCallResult]) -> String {
    if tool_calls.is_empty() {
        input_text.to_string()
    } else {
        format!("Executed {} tool call(s).", tool_calls.len())
    }
}

fn interrupted_result(
    scope: &RunScope<'_>,
    executed: Vec<ToolCallResult>,
    interruptions: Vec<HumanApprovalRequest>,
) -> RunResult {
    RunResult {
        run_id: scope.run_id.clone(),
        output_text: PAUSED_OUTPUT_TEXT.to_string(),
        messages: vec![InputItem::new(Role::Assistant, PAUSED_MESSAGE)],
        tool_calls: executed,
        usage: UsageStats::estimate(scope.input_text, PAUSED_MESSAGE),
        interruptions,
        extensions: RunExtensions {
            policy_profile: scope.policy_profile.to_string(),
            interrupted: true,
        },
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use tollgate_contracts::capability::ToolKind;

    use super::*;
    use crate::{
        guardrail::{guardrail_fn, GuardrailVerdict, Guardrails},
        tools::function_tool,
        traits::{Model, ModelResponse},
    };

    // ── Mock helpers ─────────────────────────────────────────────────────────

    /// A gate answering from a per-tool script; unknown tools are allowed.
    struct MockGate {
        script: HashMap<String, GateDecisionKind>,
        evaluated: Arc<Mutex<Vec<String>>>,
    }

    impl MockGate {
        fn new(script: &[(&str, GateDecisionKind)]) -> Self {
            Self {
                script: script.iter().map(|(n, d)| (n.to_string(), *d)).collect(),
                evaluated: Arc::new(Mutex::new(vec![])),
            }
        }
    }

    #[async_trait]
    impl ToolGate for MockGate {
        async fn evaluate(
            &self,
            _agent: &Agent,
            request: ToolCallRequest,
            profile_name: &str,
        ) -> TollgateResult<GateDecision> {
            self.evaluated.lock().unwrap().push(request.tool_name.clone());
            let decision = self
                .script
                .get(&request.tool_name)
                .copied()
                .unwrap_or(GateDecisionKind::Allow);
            Ok(GateDecision {
                decision,
                risk_level: if decision == GateDecisionKind::Allow { 1 } else { 3 },
                reason: format!("scripted {}", decision),
                policy_ref: profile_name.to_string(),
                approval_id: None,
            })
        }
    }

    /// A model replaying scripted responses, then answering "done".
    struct MockModel {
        responses: Mutex<VecDeque<ModelResponse>>,
        seen_tool_calls: Arc<Mutex<Vec<usize>>>,
    }

    impl MockModel {
        fn new(responses: Vec<ModelResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                seen_tool_calls: Arc::new(Mutex::new(vec![])),
            }
        }
    }

    #[async_trait]
    impl Model for MockModel {
        fn name(&self) -> &str {
            "mock-model"
        }

        async fn generate(&self, request: ModelRequest<'_>) -> TollgateResult<ModelResponse> {
            self.seen_tool_calls.lock().unwrap().push(request.tool_calls.len());
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| ModelResponse::text("done")))
        }
    }

    /// An audit writer that keeps every record for inspection.
    #[derive(Default)]
    struct MockAudit {
        records: Mutex<Vec<RunRecord>>,
        finalized: Mutex<Vec<RunId>>,
    }

    impl AuditWriter for MockAudit {
        fn write(&self, record: &RunRecord) -> TollgateResult<()> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }

        fn finalize(&self, run_id: &RunId) -> TollgateResult<()> {
            self.finalized.lock().unwrap().push(run_id.clone());
            Ok(())
        }
    }

    /// A function tool that logs its name into `log` when executed.
    fn logging_tool(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Tool {
        let log = log.clone();
        let tool_name = name.to_string();
        function_tool(name, "records its invocation", None, move |args| {
            let log = log.clone();
            let tool_name = tool_name.clone();
            async move {
                log.lock().unwrap().push(tool_name.clone());
                Ok(json!({ "tool": tool_name, "args": Value::Object(args) }))
            }
        })
        .unwrap()
    }

    fn agent_with(tools: &[&str], log: &Arc<Mutex<Vec<String>>>) -> Arc<Agent> {
        Arc::new(
            Agent::builder("test-agent", "run tools")
                .tools(tools.iter().map(|n| logging_tool(n, log)))
                .build()
                .unwrap(),
        )
    }

    fn calls(names: &[&str]) -> Vec<RequestedToolCall> {
        names.iter().map(|n| RequestedToolCall::new(*n)).collect()
    }

    fn runner(gate: MockGate) -> AgentRunner {
        AgentRunner::new(Arc::new(gate), RunnerConfig::default())
    }

    fn executed_names(result: &RunResult) -> Vec<&str> {
        result.tool_calls.iter().map(|c| c.tool_name.as_str()).collect()
    }

    // ── Run modes ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn run_without_calls_or_model_echoes_input() {
        let log = Arc::new(Mutex::new(vec![]));
        let runner = runner(MockGate::new(&[]));
        let result = runner
            .run(agent_with(&[], &log), "hello there", RunOptions::new())
            .await
            .unwrap();

        assert_eq!(result.output_text, "hello there");
        assert!(!result.is_interrupted());
        assert_eq!(result.extensions.policy_profile, "balanced");
        assert!(result.tool_calls.is_empty());
        assert!(result.run_id.as_str().starts_with("run_"));
    }

    #[tokio::test]
    async fn structured_input_is_flattened() {
        let log = Arc::new(Mutex::new(vec![]));
        let runner = runner(MockGate::new(&[]));
        let input = vec![
            InputItem::new(Role::System, "be brief"),
            InputItem::new(Role::User, "hi"),
        ];
        let result = runner.run(agent_with(&[], &log), input, RunOptions::new()).await.unwrap();
        assert_eq!(result.output_text, "system:be brief\nuser:hi");
    }

    #[tokio::test]
    async fn manual_calls_execute_in_order() {
        let log = Arc::new(Mutex::new(vec![]));
        let runner = runner(MockGate::new(&[]));
        let options = RunOptions::new()
            .with_policy_profile("fast")
            .with_tool_calls(calls(&["a", "b", "c"]));

        let result = runner.run(agent_with(&["a", "b", "c"], &log), "go", options).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(executed_names(&result), vec!["a", "b", "c"]);
        assert_eq!(result.output_text, "Executed 3 tool call(s).");
        assert_eq!(result.extensions.policy_profile, "fast");
        assert_eq!(result.tool_calls[0].tool_kind, ToolKind::Function);
    }

    #[tokio::test]
    async fn denied_call_fails_and_stops_the_batch() {
        let log = Arc::new(Mutex::new(vec![]));
        let runner = runner(MockGate::new(&[("b", GateDecisionKind::Deny)]));
        let options = RunOptions::new().with_tool_calls(calls(&["a", "b", "c"]));

        let result = runner.run(agent_with(&["a", "b", "c"], &log), "go", options).await;

        match result {
            Err(TollgateError::GateDenied { reason }) => assert_eq!(reason, "scripted deny"),
            other => panic!("expected GateDenied, got {:?}", other),
        }
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let log = Arc::new(Mutex::new(vec![]));
        let runner = runner(MockGate::new(&[]));
        let options = RunOptions::new().with_tool_calls(calls(&["missing"]));

        match runner.run(agent_with(&["a"], &log), "go", options).await {
            Err(TollgateError::ToolNotFound { name }) => assert_eq!(name, "missing"),
            other => panic!("expected ToolNotFound, got {:?}", other),
        }
    }

    // ── Suspension and resume ────────────────────────────────────────────────

    #[tokio::test]
    async fn needs_human_suspends_with_split_queue() {
        let log = Arc::new(Mutex::new(vec![]));
        let runner = runner(MockGate::new(&[("b", GateDecisionKind::NeedsHuman)]));
        let mut pending = RequestedToolCall::new("c").with_args(json!({ "n": 3 }));
        pending.user_intent = Some("third".to_string());
        let options = RunOptions::new()
            .with_tool_calls(calls(&["a", "b"]))
            .with_tool_call(pending.clone());

        let result = runner.run(agent_with(&["a", "b", "c"], &log), "go", options).await.unwrap();

        assert!(result.is_interrupted());
        assert_eq!(result.output_text, PAUSED_OUTPUT_TEXT);
        assert_eq!(result.messages[0].content, PAUSED_MESSAGE);
        assert_eq!(result.interruptions.len(), 1);
        assert_eq!(result.interruptions[0].tool_name, "b");
        assert_eq!(result.interruptions[0].prompt, "scripted needs_human");
        assert_eq!(executed_names(&result), vec!["a"]);
        assert_eq!(*log.lock().unwrap(), vec!["a"]);

        let state = runner.suspended_run(&result.run_id).unwrap().unwrap();
        assert_eq!(state.awaiting_call.tool_name, "b");
        assert_eq!(state.pending_calls, vec![pending]);
        assert_eq!(state.executed_calls.len(), 1);
        assert_eq!(state.continuation, Continuation::Manual);
        assert_eq!(state.approval_id, result.interruptions[0].approval_id);
    }

    #[tokio::test]
    async fn approve_and_resume_runs_the_rest_without_regating_the_approved_call() {
        let log = Arc::new(Mutex::new(vec![]));
        let gate = MockGate::new(&[("b", GateDecisionKind::NeedsHuman)]);
        let evaluated = gate.evaluated.clone();
        let runner = runner(gate);
        let options = RunOptions::new().with_tool_calls(calls(&["a", "b", "c"]));

        let paused = runner.run(agent_with(&["a", "b", "c"], &log), "go", options).await.unwrap();
        let approval_id = paused.interruptions[0].approval_id.clone();

        let result = runner
            .approve_and_resume(&paused.run_id, &approval_id, None, Some("ok".into()))
            .await
            .unwrap();

        assert!(!result.is_interrupted());
        assert_eq!(result.run_id, paused.run_id);
        assert_eq!(executed_names(&result), vec!["a", "b", "c"]);
        assert_eq!(result.output_text, "Executed 3 tool call(s).");
        // a, b (suspended), c; the approved b was not re-evaluated.
        assert_eq!(*evaluated.lock().unwrap(), vec!["a", "b", "c"]);
        assert!(runner.suspended_run(&paused.run_id).unwrap().is_none());
        assert!(runner.pending_approvals(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn deny_on_resume_drops_the_run() {
        let log = Arc::new(Mutex::new(vec![]));
        let runner = runner(MockGate::new(&[("b", GateDecisionKind::NeedsHuman)]));
        let options = RunOptions::new().with_tool_calls(calls(&["b"]));

        let paused = runner.run(agent_with(&["b"], &log), "go", options).await.unwrap();
        let approval_id = paused.interruptions[0].approval_id.clone();

        let result = runner
            .approve_and_resume(&paused.run_id, &approval_id, Some(ApprovalDecision::Deny), None)
            .await;

        match result {
            Err(TollgateError::GateDenied { reason }) => assert_eq!(reason, HUMAN_DENIED_REASON),
            other => panic!("expected GateDenied, got {:?}", other),
        }
        assert!(log.lock().unwrap().is_empty());
        assert!(runner.suspended_run(&paused.run_id).unwrap().is_none());
    }

    #[tokio::test]
    async fn resume_token_cannot_be_replayed() {
        let log = Arc::new(Mutex::new(vec![]));
        let runner = runner(MockGate::new(&[("b", GateDecisionKind::NeedsHuman)]));
        let options = RunOptions::new().with_tool_calls(calls(&["b", "b"]));

        // The second "b" suspends again after the first resume.
        let paused = runner.run(agent_with(&["b"], &log), "go", options).await.unwrap();
        let token = runner
            .submit_approval(&paused.interruptions[0].approval_id, ApprovalDecision::Approve, None)
            .unwrap();
        let second = runner.resume_run(&paused.run_id, &token.token).await.unwrap();
        assert!(second.is_interrupted());
        assert_eq!(*log.lock().unwrap(), vec!["b"]);

        match runner.resume_run(&paused.run_id, &token.token).await {
            Err(TollgateError::ResumeToken { .. }) => {}
            other => panic!("expected ResumeToken, got {:?}", other),
        }
        // The replay did not execute anything nor drop the suspension.
        assert_eq!(*log.lock().unwrap(), vec!["b"]);
        assert!(runner.suspended_run(&paused.run_id).unwrap().is_some());
    }

    #[tokio::test]
    async fn resume_without_suspension_is_a_runner_error() {
        let runner = runner(MockGate::new(&[]));
        match runner.resume_run(&RunId::new(), &ResumeTokenId::new()).await {
            Err(TollgateError::Runner { reason }) => assert!(reason.contains("no suspended run")),
            other => panic!("expected Runner, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn expired_token_keeps_the_run_and_reissue_recovers_it() {
        let log = Arc::new(Mutex::new(vec![]));
        let gate = Arc::new(MockGate::new(&[("b", GateDecisionKind::NeedsHuman)]));
        let config = RunnerConfig {
            resume_token_ttl_secs: 0,
            ..RunnerConfig::default()
        };
        let runner = AgentRunner::new(gate, config);
        let options = RunOptions::new().with_tool_calls(calls(&["b"]));

        let paused = runner.run(agent_with(&["b"], &log), "go", options).await.unwrap();
        let first_approval = paused.interruptions[0].approval_id.clone();

        // Still pending: nothing to reissue yet.
        assert!(matches!(
            runner.reissue_approval(&paused.run_id),
            Err(TollgateError::ApprovalInvalid { .. })
        ));

        match runner.approve_and_resume(&paused.run_id, &first_approval, None, None).await {
            Err(TollgateError::ResumeToken { reason }) => assert!(reason.contains("expired")),
            other => panic!("expected ResumeToken, got {:?}", other),
        }
        assert!(log.lock().unwrap().is_empty());
        assert!(runner.suspended_run(&paused.run_id).unwrap().is_some());

        let reissued = runner.reissue_approval(&paused.run_id).unwrap();
        assert_ne!(reissued.approval_id, first_approval);
        assert_eq!(reissued.tool_name, "b");
        assert_eq!(runner.pending_approvals(Some(&paused.run_id)).unwrap().len(), 1);
        let state = runner.suspended_run(&paused.run_id).unwrap().unwrap();
        assert_eq!(state.approval_id, reissued.approval_id);
    }

    #[tokio::test]
    async fn human_deny_cannot_be_reissued_away() {
        let log = Arc::new(Mutex::new(vec![]));
        let runner = runner(MockGate::new(&[("b", GateDecisionKind::NeedsHuman)]));
        let options = RunOptions::new().with_tool_calls(calls(&["b"]));

        let paused = runner.run(agent_with(&["b"], &log), "go", options).await.unwrap();
        let approval_id = paused.interruptions[0].approval_id.clone();
        let deny = runner
            .submit_approval(&approval_id, ApprovalDecision::Deny, None)
            .unwrap();

        match runner.reissue_approval(&paused.run_id) {
            Err(TollgateError::ApprovalInvalid { .. }) => {}
            other => panic!("expected ApprovalInvalid, got {:?}", other),
        }
        assert_eq!(runner.suspended_run(&paused.run_id).unwrap().unwrap().approval_id, approval_id);
        assert!(runner.pending_approvals(None).unwrap().is_empty());

        // The deny token still drops the run.
        match runner.resume_run(&paused.run_id, &deny.token).await {
            Err(TollgateError::GateDenied { reason }) => assert_eq!(reason, HUMAN_DENIED_REASON),
            other => panic!("expected GateDenied, got {:?}", other),
        }
        assert!(runner.suspended_run(&paused.run_id).unwrap().is_none());
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unredeemed_or_redeemed_approvals_are_not_reissued() {
        let log = Arc::new(Mutex::new(vec![]));
        let runner = runner(MockGate::new(&[("b", GateDecisionKind::NeedsHuman)]));
        let options = RunOptions::new().with_tool_calls(calls(&["b", "b"]));

        let paused = runner.run(agent_with(&["b"], &log), "go", options).await.unwrap();
        let token = runner
            .submit_approval(&paused.interruptions[0].approval_id, ApprovalDecision::Approve, None)
            .unwrap();
        // Approved with a live token: resume instead.
        assert!(matches!(
            runner.reissue_approval(&paused.run_id),
            Err(TollgateError::ApprovalInvalid { .. })
        ));

        let second = runner.resume_run(&paused.run_id, &token.token).await.unwrap();
        assert!(second.is_interrupted());
        // The new approval is pending; the redeemed one is gone from the state.
        assert!(matches!(
            runner.reissue_approval(&paused.run_id),
            Err(TollgateError::ApprovalInvalid { .. })
        ));
        assert_eq!(*log.lock().unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn fatal_error_after_resume_drops_the_suspended_run() {
        let log = Arc::new(Mutex::new(vec![]));
        let audit = Arc::new(MockAudit::default());
        let runner = runner(MockGate::new(&[
            ("pay", GateDecisionKind::NeedsHuman),
            ("refund", GateDecisionKind::Deny),
        ]))
        .with_audit(audit.clone());
        let options = RunOptions::new().with_tool_calls(calls(&["pay", "refund"]));

        let paused = runner
            .run(agent_with(&["pay", "refund"], &log), "go", options)
            .await
            .unwrap();
        let result = runner
            .approve_and_resume(&paused.run_id, &paused.interruptions[0].approval_id, None, None)
            .await;

        assert!(matches!(result, Err(TollgateError::GateDenied { .. })));
        assert_eq!(*log.lock().unwrap(), vec!["pay"]);
        assert!(runner.suspended_run(&paused.run_id).unwrap().is_none());

        // Nothing left to reissue, so the approved call cannot run twice.
        match runner.reissue_approval(&paused.run_id) {
            Err(TollgateError::Runner { reason }) => assert!(reason.contains("no suspended run")),
            other => panic!("expected Runner, got {:?}", other),
        }
        assert_eq!(*log.lock().unwrap(), vec!["pay"]);
    }

    #[tokio::test]
    async fn missing_tool_after_resume_drops_the_suspended_run() {
        let log = Arc::new(Mutex::new(vec![]));
        let runner = runner(MockGate::new(&[("pay", GateDecisionKind::NeedsHuman)]));
        let options = RunOptions::new().with_tool_calls(calls(&["pay", "missing"]));

        let paused = runner.run(agent_with(&["pay"], &log), "go", options).await.unwrap();
        let result = runner
            .approve_and_resume(&paused.run_id, &paused.interruptions[0].approval_id, None, None)
            .await;

        assert!(matches!(result, Err(TollgateError::ToolNotFound { .. })));
        assert!(runner.suspended_run(&paused.run_id).unwrap().is_none());
        assert_eq!(*log.lock().unwrap(), vec!["pay"]);
    }

    #[tokio::test]
    async fn require_human_approval_escalates_allowed_calls() {
        let log = Arc::new(Mutex::new(vec![]));
        let runner = runner(MockGate::new(&[]));
        let options = RunOptions::new()
            .require_human_approval()
            .with_tool_calls(calls(&["a", "b"]));

        let paused = runner.run(agent_with(&["a", "b"], &log), "go", options).await.unwrap();

        assert!(paused.is_interrupted());
        assert_eq!(paused.interruptions[0].tool_name, "a");
        assert_eq!(paused.interruptions[0].prompt, FORCED_APPROVAL_REASON);
        let state = runner.suspended_run(&paused.run_id).unwrap().unwrap();
        assert_eq!(state.gate_decision.risk_level, 2);
        assert!(state.require_human_approval);

        // After approving "a", "b" is escalated again.
        let next = runner
            .approve_and_resume(&paused.run_id, &paused.interruptions[0].approval_id, None, None)
            .await
            .unwrap();
        assert!(next.is_interrupted());
        assert_eq!(next.interruptions[0].tool_name, "b");
        assert_eq!(executed_names(&next), vec!["a"]);
    }

    // ── Model loop ───────────────────────────────────────────────────────────

    fn model_agent(model: Arc<dyn Model>, tools: &[&str], log: &Arc<Mutex<Vec<String>>>) -> Arc<Agent> {
        Arc::new(
            Agent::builder("planner", "plan and call tools")
                .tools(tools.iter().map(|n| logging_tool(n, log)))
                .model(model)
                .build()
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn model_loop_plans_then_answers() {
        let log = Arc::new(Mutex::new(vec![]));
        let model = Arc::new(MockModel::new(vec![
            ModelResponse::plan(calls(&["a"])),
            ModelResponse::plan(calls(&["b"])),
            ModelResponse::text("all done"),
        ]));
        let seen = model.seen_tool_calls.clone();
        let runner = runner(MockGate::new(&[]));

        let result = runner
            .run(model_agent(model, &["a", "b"], &log), "go", RunOptions::new())
            .await
            .unwrap();

        assert_eq!(result.output_text, "all done");
        assert_eq!(executed_names(&result), vec!["a", "b"]);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn model_loop_respects_max_turns() {
        let log = Arc::new(Mutex::new(vec![]));
        let model = Arc::new(MockModel::new(vec![
            ModelResponse::plan(calls(&["a"])),
            ModelResponse::plan(calls(&["a"])),
            ModelResponse::plan(calls(&["a"])),
        ]));
        let runner = runner(MockGate::new(&[]));

        let result = runner
            .run(model_agent(model, &["a"], &log), "go", RunOptions::new().with_max_turns(2))
            .await;

        match result {
            Err(TollgateError::Runner { reason }) => assert!(reason.contains("max_turns")),
            other => panic!("expected Runner, got {:?}", other),
        }
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn model_loop_resumes_after_approval() {
        let log = Arc::new(Mutex::new(vec![]));
        let model = Arc::new(MockModel::new(vec![
            ModelResponse::plan(calls(&["a", "risky"])),
            ModelResponse::text("finished"),
        ]));
        let seen = model.seen_tool_calls.clone();
        let runner = runner(MockGate::new(&[("risky", GateDecisionKind::NeedsHuman)]));

        let paused = runner
            .run(model_agent(model, &["a", "risky"], &log), "go", RunOptions::new().with_max_turns(4))
            .await
            .unwrap();
        let state = runner.suspended_run(&paused.run_id).unwrap().unwrap();
        assert_eq!(state.continuation, Continuation::Model);
        assert_eq!(state.remaining_model_turns, 3);

        let result = runner
            .approve_and_resume(&paused.run_id, &paused.interruptions[0].approval_id, None, None)
            .await
            .unwrap();

        assert_eq!(result.output_text, "finished");
        assert_eq!(executed_names(&result), vec!["a", "risky"]);
        // The second model turn saw both executed calls.
        assert_eq!(*seen.lock().unwrap(), vec![0, 2]);
    }

    #[tokio::test]
    async fn manual_calls_with_model_take_final_text_from_model() {
        let log = Arc::new(Mutex::new(vec![]));
        let model = Arc::new(MockModel::new(vec![ModelResponse::text("summary")]));
        let runner = runner(MockGate::new(&[]));
        let options = RunOptions::new().with_tool_calls(calls(&["a"]));

        let result = runner.run(model_agent(model, &["a"], &log), "go", options).await.unwrap();
        assert_eq!(result.output_text, "summary");
    }

    // ── Guardrails and audit ─────────────────────────────────────────────────

    #[tokio::test]
    async fn input_guardrail_denial_prevents_any_gate_call() {
        let log = Arc::new(Mutex::new(vec![]));
        let gate = MockGate::new(&[]);
        let evaluated = gate.evaluated.clone();
        let runner = runner(gate);
        let agent = Arc::new(
            Agent::builder("guarded", "test")
                .tool(logging_tool("a", &log))
                .guardrails(Guardrails {
                    input: vec![guardrail_fn(|_| GuardrailVerdict::deny("no"))],
                    ..Guardrails::default()
                })
                .build()
                .unwrap(),
        );

        let result = runner
            .run(agent, "go", RunOptions::new().with_tool_calls(calls(&["a"])))
            .await;
        assert!(matches!(result, Err(TollgateError::GuardrailDenied { .. })));
        assert!(evaluated.lock().unwrap().is_empty());
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn tool_guardrail_denial_aborts_without_suspension() {
        let log = Arc::new(Mutex::new(vec![]));
        let runner = runner(MockGate::new(&[]));
        let agent = Arc::new(
            Agent::builder("guarded", "test")
                .tools([logging_tool("a", &log), logging_tool("b", &log)])
                .guardrails(Guardrails {
                    tool: vec![guardrail_fn(|check| {
                        match check.requested_call.map(|c| c.tool_name.as_str()) {
                            Some("b") => GuardrailVerdict::deny("b is blocked"),
                            _ => GuardrailVerdict::allow(),
                        }
                    })],
                    ..Guardrails::default()
                })
                .build()
                .unwrap(),
        );

        let result = runner
            .run(agent, "go", RunOptions::new().with_tool_calls(calls(&["a", "b"])))
            .await;
        match result {
            Err(TollgateError::GuardrailDenied { reason }) => assert_eq!(reason, "b is blocked"),
            other => panic!("expected GuardrailDenied, got {:?}", other),
        }
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn output_guardrail_denies_after_tools_and_model_ran() {
        let log = Arc::new(Mutex::new(vec![]));
        let audit = Arc::new(MockAudit::default());
        let model = Arc::new(MockModel::new(vec![
            ModelResponse::plan(calls(&["a"])),
            ModelResponse::text("the secret is 42"),
        ]));
        let seen = model.seen_tool_calls.clone();
        let runner = runner(MockGate::new(&[])).with_audit(audit.clone());
        let agent = Arc::new(
            Agent::builder("guarded-planner", "plan and call tools")
                .tool(logging_tool("a", &log))
                .model(model)
                .guardrails(Guardrails {
                    output: vec![guardrail_fn(|check| {
                        if check.final_output.unwrap_or("").contains("secret") {
                            GuardrailVerdict::deny("output leaks a secret")
                        } else {
                            GuardrailVerdict::allow()
                        }
                    })],
                    ..Guardrails::default()
                })
                .build()
                .unwrap(),
        );

        let result = runner.run(agent, "go", RunOptions::new()).await;

        match result {
            Err(TollgateError::GuardrailDenied { reason }) => assert_eq!(reason, "output leaks a secret"),
            other => panic!("expected GuardrailDenied, got {:?}", other),
        }
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
        let records = audit.records.lock().unwrap();
        assert!(records.iter().any(|r| matches!(r.event, RunEvent::ToolExecuted { .. })));
        assert!(!records.iter().any(|r| matches!(r.event, RunEvent::Completed { .. })));
        assert!(audit.finalized.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn audit_journal_follows_the_run() {
        let log = Arc::new(Mutex::new(vec![]));
        let audit = Arc::new(MockAudit::default());
        let runner = runner(MockGate::new(&[("b", GateDecisionKind::NeedsHuman)])).with_audit(audit.clone());
        let options = RunOptions::new().with_tool_calls(calls(&["a", "b"]));

        let paused = runner.run(agent_with(&["a", "b"], &log), "go", options).await.unwrap();
        runner
            .approve_and_resume(&paused.run_id, &paused.interruptions[0].approval_id, None, None)
            .await
            .unwrap();

        let events: Vec<&'static str> = audit
            .records
            .lock()
            .unwrap()
            .iter()
            .map(|r| match r.event {
                RunEvent::GateEvaluated { .. } => "gate",
                RunEvent::Suspended { .. } => "suspended",
                RunEvent::ApprovalSubmitted { .. } => "submitted",
                RunEvent::Resumed { .. } => "resumed",
                RunEvent::ToolExecuted { .. } => "executed",
                RunEvent::Completed { .. } => "completed",
            })
            .collect();
        assert_eq!(
            events,
            vec!["gate", "executed", "gate", "suspended", "submitted", "resumed", "executed", "completed"]
        );
        assert_eq!(*audit.finalized.lock().unwrap(), vec![paused.run_id.clone()]);
        assert!(audit.records.lock().unwrap().iter().all(|r| r.run_id == paused.run_id));
    }
}
