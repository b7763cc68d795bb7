//! # tollgate-audit
//!
//! Append-only, SHA-256 hash-chained run journal for the Tollgate runtime.
//!
//! ## Overview
//!
//! Every `RunRecord` the runner emits is wrapped in an `AuditEvent` that links
//! to the previous event of the same run via its SHA-256 hash. Tampering with
//! any event breaks the chain and is detected by `verify_chain`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tollgate_audit::InMemoryAuditWriter;
//!
//! let audit = Arc::new(InMemoryAuditWriter::new());
//! let runner = AgentRunner::new(gate, RunnerConfig::default()).with_audit(audit.clone());
//! let result = runner.run(agent, "hello", RunOptions::new()).await?;
//!
//! assert!(audit.verify_integrity(&result.run_id)?);
//! let log = audit.export_log(&result.run_id)?;
//! ```

pub mod chain;
pub mod event;
pub mod memory;

pub use chain::{hash_event, verify_chain};
pub use event::{AuditEvent, AuditLog};
pub use memory::InMemoryAuditWriter;

// ── Tests ─────────────────────────────────────────────────────────────────────
