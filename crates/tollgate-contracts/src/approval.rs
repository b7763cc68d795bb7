//! Human approval and resume token types.
//!
//! An approval request is created only from a `needs_human` gate decision and
//! is decided exactly once. Deciding it mints a single-use, time-limited
//! `ResumeToken` that the runner consumes to continue the suspended run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::{ApprovalId, ResumeTokenId, RunId};

/// Action label attached to every approval request.
pub const HUMAN_REVIEW_ACTION: &str = "human_review";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Denied,
}

/// What a human reviewer decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approve,
    Deny,
}

impl ApprovalDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Deny => "deny",
        }
    }
}

impl std::fmt::Display for ApprovalDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request for human sign-off on one suspended tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanApprovalRequest {
    pub approval_id: ApprovalId,
    pub run_id: RunId,
    pub required_action: String,
    pub prompt: String,
    pub status: ApprovalStatus,
    /// The tool whose call is waiting on this approval.
    pub tool_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeTokenStatus {
    Active,
    Used,
    Expired,
}

/// Single-use credential proving an approval decision was made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeToken {
    pub token: ResumeTokenId,
    pub run_id: RunId,
    pub approval_id: ApprovalId,
    pub expires_at: DateTime<Utc>,
    pub status: ResumeTokenStatus,
}

impl ResumeToken {
    /// True once the wall clock has reached the expiry instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
