//! # tollgate-policy
//!
//! Policy profiles, capability snapshots and the fail-closed safety gate for
//! the Tollgate runtime.
//!
//! ## Overview
//!
//! - [`InMemoryPolicyStore`] implements
//!   [`PolicyStore`](tollgate_core::traits::PolicyStore) with the built-in
//!   `strict`, `balanced` and `fast` profiles, optionally overridden from TOML.
//! - [`derive_capability_snapshot`] summarizes an agent's tool catalog.
//! - [`SafetyGate`] implements [`ToolGate`](tollgate_core::traits::ToolGate):
//!   it enriches each request, calls the injected evaluator, validates the
//!   result and applies the profile.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::{path::Path, sync::Arc};
//! use tollgate_policy::{InMemoryPolicyStore, SafetyGate};
//!
//! let store = InMemoryPolicyStore::from_file(Path::new("policies/default.toml"))?;
//! let gate = SafetyGate::allow_all(Arc::new(store));
//! // Pass `gate` to `tollgate_core::AgentRunner::new(...)`.
//! ```

pub mod capability;
pub mod config;
pub mod gate;
pub mod store;

pub use capability::derive_capability_snapshot;
pub use config::{PolicyConfig, ProfileEntry};
pub use gate::{apply_profile, validate_decision, AllowAllEvaluator, FnEvaluator, SafetyGate};
pub use store::InMemoryPolicyStore;

// ── Tests ─────────────────────────────────────────────────────────────────────
