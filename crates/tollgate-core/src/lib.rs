//! # tollgate-core
//!
//! The guarded, resumable agent runtime for Tollgate.
//!
//! This crate provides:
//! - The trait boundaries (`ToolAction`, `Model`, `SafetyEvaluator`, `ToolGate`,
//!   `PolicyStore`, `AuditWriter`)
//! - The agent and tool model, guardrails, and tool constructors
//! - The `ApprovalController` (human sign-off and single-use resume tokens)
//! - The `AgentRunner` that drives the tool-call loop in the correct trust order
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tollgate_core::{AgentRunner, RunOptions, RunnerConfig};
//! use tollgate_policy::{InMemoryPolicyStore, SafetyGate};
//!
//! let gate = SafetyGate::allow_all(Arc::new(InMemoryPolicyStore::new()));
//! let runner = AgentRunner::new(Arc::new(gate), RunnerConfig::default());
//! let result = runner.run(agent, "summarize README", RunOptions::new()).await?;
//! ```

pub mod agent;
pub mod approval;
pub mod config;
pub mod guardrail;
pub mod runner;
pub mod tools;
pub mod traits;

pub use agent::{Agent, AgentBuilder, McpMetadata, SkillMetadata, Tool, ToolSpec};
pub use approval::{ApprovalController, ConsumedToken};
pub use config::RunnerConfig;
pub use guardrail::{guardrail_fn, guardrails_template, GuardrailCheck, GuardrailStage, GuardrailVerdict, Guardrails};
pub use runner::{AgentRunner, RunOptions};
pub use tools::{discover_mcp_tool, function_tool, hosted_mcp_tool, skill_tool, HostedMcpOptions, McpServer, SkillManifest};
