//! The safety gate: fail-closed authorization for every tool call.
//!
//! Evaluation algorithm:
//!
//! 1. Look up the named profile (unknown → `PolicyInvalid`).
//! 2. Derive the capability snapshot and find the target tool's catalog entry.
//! 3. Hand the enriched request to the injected `SafetyEvaluator`.
//! 4. Validate the raw decision. An evaluator error or any contract violation
//!    becomes `GateEvaluation`; it is never read as an allow.
//! 5. Apply the profile: out-of-scope tool kinds are denied, and allowed calls
//!    are escalated to a human according to the approval mode.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use tollgate_contracts::{
    error::{TollgateError, TollgateResult},
    policy::{ApprovalMode, GateDecision, GateDecisionKind, PolicyProfile, RawDecision, ToolCallRequest},
};
use tollgate_core::{
    agent::Agent,
    traits::{PolicyStore, SafetyEvaluator, ToolGate},
};

use crate::capability::derive_capability_snapshot;

/// Under `risk_based`, allowed calls at or above this risk need a human.
pub const RISK_BASED_THRESHOLD: u8 = 4;

// ── Evaluators ───────────────────────────────────────────────────────────────

/// The default evaluator: allows everything at risk level 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllEvaluator;

#[async_trait]
impl SafetyEvaluator for AllowAllEvaluator {
    async fn evaluate(
        &self,
        _agent: &Agent,
        _request: &ToolCallRequest,
        _profile: &PolicyProfile,
    ) -> TollgateResult<RawDecision> {
        Ok(RawDecision::allow("default-allow", 1))
    }
}

/// A caller-supplied synchronous judgment.
pub struct FnEvaluator<F> {
    f: F,
}

impl<F> FnEvaluator<F>
where
    F: Fn(&ToolCallRequest, &PolicyProfile) -> TollgateResult<RawDecision> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> SafetyEvaluator for FnEvaluator<F>
where
    F: Fn(&ToolCallRequest, &PolicyProfile) -> TollgateResult<RawDecision> + Send + Sync,
{
    async fn evaluate(
        &self,
        _agent: &Agent,
        request: &ToolCallRequest,
        profile: &PolicyProfile,
    ) -> TollgateResult<RawDecision> {
        (self.f)(request, profile)
    }
}

// ── Gate ─────────────────────────────────────────────────────────────────────

pub struct SafetyGate {
    evaluator: Arc<dyn SafetyEvaluator>,
    store: Arc<dyn PolicyStore>,
}

impl SafetyGate {
    pub fn new(evaluator: Arc<dyn SafetyEvaluator>, store: Arc<dyn PolicyStore>) -> Self {
        Self { evaluator, store }
    }

    /// A gate backed by `AllowAllEvaluator`. Profiles still apply.
    pub fn allow_all(store: Arc<dyn PolicyStore>) -> Self {
        Self::new(Arc::new(AllowAllEvaluator), store)
    }
}

#[async_trait]
impl ToolGate for SafetyGate {
    async fn evaluate(
        &self,
        agent: &Agent,
        mut request: ToolCallRequest,
        profile_name: &str,
    ) -> TollgateResult<GateDecision> {
        let profile = self.store.profile(profile_name)?;

        let snapshot = derive_capability_snapshot(agent)?;
        request.target_tool = snapshot.find_tool(&request.tool_name).cloned();
        request.tool_catalog = Some(snapshot.tool_catalog.clone());
        request.capability_snapshot = Some(snapshot);

        debug!(
            agent = %agent.name(),
            tool = %request.tool_name,
            kind = %request.tool_kind,
            profile = %profile.name,
            "evaluating tool call"
        );

        let raw = self
            .evaluator
            .evaluate(agent, &request, &profile)
            .await
            .map_err(|e| {
                warn!(tool = %request.tool_name, error = %e, "safety evaluator failed");
                TollgateError::gate_evaluation(format!("safety evaluator failed: {}", e))
            })?;

        let validated = validate_decision(raw, &profile.name).map_err(|e| {
            warn!(tool = %request.tool_name, error = %e, "safety evaluator returned an invalid decision");
            e
        })?;
        let decision = apply_profile(validated, agent, &request, &profile);

        info!(
            tool = %request.tool_name,
            decision = %decision.decision,
            risk_level = decision.risk_level,
            policy_ref = %decision.policy_ref,
            "gate decision"
        );
        Ok(decision)
    }
}

/// Check a raw evaluator decision against the structured-output contract.
///
/// `policy_ref` defaults to `profile_name` when missing. Every violation is a
/// `GateEvaluation` error.
pub fn validate_decision(raw: RawDecision, profile_name: &str) -> TollgateResult<GateDecision> {
    let decision = GateDecisionKind::parse(&raw.decision).ok_or_else(|| {
        TollgateError::gate_evaluation(format!("decision '{}' is not one of allow, deny, needs_human", raw.decision))
    })?;

    if !(1..=5).contains(&raw.risk_level) {
        return Err(TollgateError::gate_evaluation(format!(
            "risk_level must be within 1..=5, got {}",
            raw.risk_level
        )));
    }

    let reason = match raw.reason {
        Some(reason) if !reason.is_empty() => reason,
        _ => return Err(TollgateError::gate_evaluation("reason is required")),
    };

    let policy_ref = raw.policy_ref.unwrap_or_else(|| profile_name.to_string());
    if policy_ref.is_empty() {
        return Err(TollgateError::gate_evaluation("policy_ref is required"));
    }

    Ok(GateDecision {
        decision,
        risk_level: raw.risk_level as u8,
        reason,
        policy_ref,
        approval_id: None,
    })
}

/// Apply the profile's scopes and approval mode to a validated decision.
pub fn apply_profile(
    decision: GateDecision,
    agent: &Agent,
    request: &ToolCallRequest,
    profile: &PolicyProfile,
) -> GateDecision {
    if !profile.allows_scope(request.tool_kind) {
        return GateDecision {
            decision: GateDecisionKind::Deny,
            reason: format!(
                "tool kind '{}' is outside the scopes of profile '{}'",
                request.tool_kind, profile.name
            ),
            ..decision
        };
    }

    if decision.decision != GateDecisionKind::Allow {
        return decision;
    }

    let mcp_requires_approval = agent
        .find_tool(&request.tool_name)
        .and_then(|tool| tool.mcp())
        .is_some_and(|mcp| mcp.require_approval);

    match profile.approval_mode {
        ApprovalMode::Never => decision,
        ApprovalMode::Always => {
            let reason = format!("{} (profile '{}' requires human approval)", decision.reason, profile.name);
            decision.escalate(reason)
        }
        ApprovalMode::RiskBased if decision.risk_level >= RISK_BASED_THRESHOLD => {
            let reason = format!(
                "{} (risk level {} requires human approval)",
                decision.reason, decision.risk_level
            );
            decision.escalate(reason)
        }
        ApprovalMode::RiskBased if mcp_requires_approval => {
            let reason = format!("{} (MCP tool '{}' requires approval)", decision.reason, request.tool_name);
            decision.escalate(reason)
        }
        ApprovalMode::RiskBased => decision,
    }
}
