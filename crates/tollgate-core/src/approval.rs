//! The approval controller: human sign-off records and resume tokens.
//!
//! One controller is shared by every run of a runner. Each approval request
//! is decided at most once and each resume token is consumed at most once;
//! both transitions are check-and-set under the same lock, so two concurrent
//! submissions of one approval id cannot both succeed.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{Duration, Utc};
use tracing::{debug, info};

use tollgate_contracts::{
    agent::{ApprovalId, ResumeTokenId, RunId},
    approval::{
        ApprovalDecision, ApprovalStatus, HumanApprovalRequest, ResumeToken, ResumeTokenStatus,
        HUMAN_REVIEW_ACTION,
    },
    error::{TollgateError, TollgateResult},
    policy::{GateDecision, GateDecisionKind},
};

/// Default lifetime of a resume token.
pub const DEFAULT_RESUME_TOKEN_TTL_SECS: i64 = 900;

/// What a successfully consumed resume token authorizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedToken {
    pub approval_id: ApprovalId,
    pub decision: ApprovalDecision,
}

struct ApprovalRecord {
    request: HumanApprovalRequest,
    comment: Option<String>,
}

struct TokenRecord {
    token: ResumeToken,
    decision: ApprovalDecision,
}

#[derive(Default)]
struct ControllerState {
    /// Approval records in insertion order.
    approvals: Vec<ApprovalRecord>,
    /// Position of each approval id in `approvals`.
    index: HashMap<ApprovalId, usize>,
    tokens: HashMap<ResumeTokenId, TokenRecord>,
}

impl ControllerState {
    fn record_mut(&mut self, approval_id: &ApprovalId) -> Option<&mut ApprovalRecord> {
        let position = *self.index.get(approval_id)?;
        self.approvals.get_mut(position)
    }
}

pub struct ApprovalController {
    ttl: Duration,
    state: Mutex<ControllerState>,
}

impl Default for ApprovalController {
    fn default() -> Self {
        Self::new()
    }
}

impl ApprovalController {
    pub fn new() -> Self {
        Self::with_ttl_secs(DEFAULT_RESUME_TOKEN_TTL_SECS)
    }

    /// A TTL of zero (or less) yields tokens that are already expired.
    pub fn with_ttl_secs(ttl_secs: i64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_secs),
            state: Mutex::new(ControllerState::default()),
        }
    }

    fn lock(&self) -> TollgateResult<MutexGuard<'_, ControllerState>> {
        self.state
            .lock()
            .map_err(|e| TollgateError::runner(format!("approval state lock poisoned: {}", e)))
    }

    /// Register a pending approval for a `needs_human` decision.
    ///
    /// The id is taken from the decision when present. Reusing an id replaces
    /// the earlier record but keeps its position.
    pub fn create_approval_request(
        &self,
        run_id: &RunId,
        decision: &GateDecision,
        prompt: impl Into<String>,
        tool_name: impl Into<String>,
    ) -> TollgateResult<HumanApprovalRequest> {
        if run_id.as_str().is_empty() {
            return Err(TollgateError::ApprovalInvalid {
                reason: "run id is required".to_string(),
            });
        }
        if decision.decision != GateDecisionKind::NeedsHuman {
            return Err(TollgateError::ApprovalInvalid {
                reason: format!(
                    "approval requests require a needs_human decision, got {}",
                    decision.decision
                ),
            });
        }

        let request = HumanApprovalRequest {
            approval_id: decision.approval_id.clone().unwrap_or_default(),
            run_id: run_id.clone(),
            required_action: HUMAN_REVIEW_ACTION.to_string(),
            prompt: prompt.into(),
            status: ApprovalStatus::Pending,
            tool_name: tool_name.into(),
            created_at: Utc::now(),
        };

        let mut state = self.lock()?;
        let record = ApprovalRecord {
            request: request.clone(),
            comment: None,
        };
        let existing = state.index.get(&request.approval_id).copied();
        match existing {
            Some(position) => state.approvals[position] = record,
            None => {
                let position = state.approvals.len();
                state.index.insert(request.approval_id.clone(), position);
                state.approvals.push(record);
            }
        }

        info!(
            run_id = %run_id,
            approval_id = %request.approval_id,
            tool = %request.tool_name,
            "approval request created"
        );
        Ok(request)
    }

    /// Pending approvals in creation order, optionally for one run only.
    pub fn pending_approvals(&self, run_id: Option<&RunId>) -> TollgateResult<Vec<HumanApprovalRequest>> {
        let state = self.lock()?;
        Ok(state
            .approvals
            .iter()
            .map(|record| &record.request)
            .filter(|request| request.status == ApprovalStatus::Pending)
            .filter(|request| run_id.map_or(true, |id| &request.run_id == id))
            .cloned()
            .collect())
    }

    pub fn approval(&self, approval_id: &ApprovalId) -> TollgateResult<Option<HumanApprovalRequest>> {
        let state = self.lock()?;
        Ok(state
            .index
            .get(approval_id)
            .and_then(|&position| state.approvals.get(position))
            .map(|record| record.request.clone()))
    }

    /// The reviewer comment recorded with a decided approval, if any.
    pub fn comment(&self, approval_id: &ApprovalId) -> TollgateResult<Option<String>> {
        let state = self.lock()?;
        Ok(state
            .index
            .get(approval_id)
            .and_then(|&position| state.approvals.get(position))
            .and_then(|record| record.comment.clone()))
    }

    /// Decide a pending approval and mint a resume token for its run.
    ///
    /// A token is minted for both outcomes; consuming a deny token is how the
    /// runner learns to drop the suspended run.
    pub fn submit_approval(
        &self,
        approval_id: &ApprovalId,
        decision: ApprovalDecision,
        comment: Option<String>,
    ) -> TollgateResult<ResumeToken> {
        let mut state = self.lock()?;
        let ttl = self.ttl;

        let record = state
            .record_mut(approval_id)
            .ok_or_else(|| TollgateError::ApprovalNotFound {
                approval_id: approval_id.to_string(),
            })?;
        if record.request.status != ApprovalStatus::Pending {
            return Err(TollgateError::ApprovalInvalid {
                reason: format!("approval {} is not pending", approval_id),
            });
        }

        record.request.status = match decision {
            ApprovalDecision::Approve => ApprovalStatus::Approved,
            ApprovalDecision::Deny => ApprovalStatus::Denied,
        };
        record.comment = comment;
        let run_id = record.request.run_id.clone();

        let token = ResumeToken {
            token: ResumeTokenId::new(),
            run_id,
            approval_id: approval_id.clone(),
            expires_at: Utc::now() + ttl,
            status: ResumeTokenStatus::Active,
        };
        state.tokens.insert(
            token.token.clone(),
            TokenRecord {
                token: token.clone(),
                decision,
            },
        );

        info!(
            run_id = %token.run_id,
            approval_id = %approval_id,
            decision = %decision,
            "approval submitted"
        );
        Ok(token)
    }

    /// Validate and consume a resume token.
    ///
    /// Any rejection leaves the token untouched.
    pub fn consume_resume_token(&self, run_id: &RunId, token: &ResumeTokenId) -> TollgateResult<ConsumedToken> {
        self.consume(run_id, None, token)
    }

    /// `consume_resume_token`, also requiring the token to have been minted
    /// for `approval_id`.
    pub fn consume_resume_token_for(
        &self,
        run_id: &RunId,
        approval_id: &ApprovalId,
        token: &ResumeTokenId,
    ) -> TollgateResult<ConsumedToken> {
        self.consume(run_id, Some(approval_id), token)
    }

    /// Whether `approval_id` was approved and its resume token ran out
    /// without being used.
    pub fn approval_lapsed(&self, approval_id: &ApprovalId) -> TollgateResult<bool> {
        let state = self.lock()?;
        let approved = state
            .index
            .get(approval_id)
            .and_then(|&position| state.approvals.get(position))
            .map_or(false, |record| record.request.status == ApprovalStatus::Approved);
        if !approved {
            return Ok(false);
        }

        let now = Utc::now();
        Ok(state
            .tokens
            .values()
            .filter(|record| &record.token.approval_id == approval_id)
            .all(|record| record.token.status == ResumeTokenStatus::Active && record.token.is_expired_at(now)))
    }

    fn consume(
        &self,
        run_id: &RunId,
        approval_id: Option<&ApprovalId>,
        token: &ResumeTokenId,
    ) -> TollgateResult<ConsumedToken> {
        let mut state = self.lock()?;
        let record = state
            .tokens
            .get_mut(token)
            .ok_or_else(|| TollgateError::resume_token("resume token is not found"))?;

        if &record.token.run_id != run_id {
            return Err(TollgateError::resume_token("run id mismatch"));
        }
        if let Some(expected) = approval_id {
            if &record.token.approval_id != expected {
                return Err(TollgateError::resume_token(format!(
                    "token was issued for superseded approval {}",
                    record.token.approval_id
                )));
            }
        }
        if record.token.status != ResumeTokenStatus::Active {
            return Err(TollgateError::resume_token("token is not active"));
        }
        if record.token.is_expired_at(Utc::now()) {
            return Err(TollgateError::resume_token("token has expired"));
        }

        record.token.status = ResumeTokenStatus::Used;
        debug!(run_id = %run_id, approval_id = %record.token.approval_id, "resume token consumed");
        Ok(ConsumedToken {
            approval_id: record.token.approval_id.clone(),
            decision: record.decision,
        })
    }
}
