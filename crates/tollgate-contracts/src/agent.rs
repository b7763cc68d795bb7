//! Run identity and input types.
//!
//! Identifiers are plain strings with a kind prefix so they stay readable in
//! logs and audit records: `run_…`, `approval_…`, `resume_…`.

use std::fmt;

use serde::{Deserialize, Serialize};

fn prefixed_id(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
}

/// Unique identifier for one end-to-end run of an agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(prefixed_id("run"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RunId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identifier of a human approval request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApprovalId(pub String);

impl ApprovalId {
    pub fn new() -> Self {
        Self(prefixed_id("approval"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ApprovalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ApprovalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ApprovalId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Opaque value of a single-use resume token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResumeTokenId(pub String);

impl ResumeTokenId {
    pub fn new() -> Self {
        Self(prefixed_id("resume"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ResumeTokenId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResumeTokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResumeTokenId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Conversation role of an input item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

/// One message in a structured run input or in a run result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputItem {
    pub role: Role,
    pub content: String,
}

impl InputItem {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// What a caller hands to `AgentRunner::run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunInput {
    Text(String),
    Items(Vec<InputItem>),
}

impl RunInput {
    /// Flatten the input to plain text. Structured items become
    /// `role:content` lines joined by newlines.
    pub fn flatten(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Items(items) => items
                .iter()
                .map(|item| format!("{}:{}", item.role.as_str(), item.content))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl From<&str> for RunInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RunInput {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<InputItem>> for RunInput {
    fn from(value: Vec<InputItem>) -> Self {
        Self::Items(value)
    }
}
