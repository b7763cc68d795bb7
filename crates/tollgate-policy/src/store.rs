//! The in-memory policy store.
//!
//! `InMemoryPolicyStore` starts with three built-in profiles:
//!
//! | name       | approval mode | scopes               |
//! |------------|---------------|----------------------|
//! | `strict`   | `always`      | function, skill, mcp |
//! | `balanced` | `risk_based`  | function, skill, mcp |
//! | `fast`     | `never`       | function, skill, mcp |
//!
//! Profiles can be added or replaced at runtime, or loaded from TOML on top
//! of the built-ins.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use tracing::debug;

use tollgate_contracts::{
    error::{TollgateError, TollgateResult},
    policy::{ApprovalMode, PolicyProfile},
};
use tollgate_core::traits::PolicyStore;

use crate::config::PolicyConfig;

/// Read-mostly profile table shared across runs.
#[derive(Debug)]
pub struct InMemoryPolicyStore {
    profiles: RwLock<HashMap<String, PolicyProfile>>,
}

impl Default for InMemoryPolicyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPolicyStore {
    /// A store seeded with the built-in profiles.
    pub fn new() -> Self {
        let profiles = [
            PolicyProfile::new("strict", ApprovalMode::Always),
            PolicyProfile::new("balanced", ApprovalMode::RiskBased),
            PolicyProfile::new("fast", ApprovalMode::Never),
        ]
        .into_iter()
        .map(|p| (p.name.clone(), p))
        .collect();

        Self {
            profiles: RwLock::new(profiles),
        }
    }

    /// Built-in profiles overridden by the entries of `config`.
    pub fn from_config(config: &PolicyConfig) -> TollgateResult<Self> {
        let store = Self::new();
        for profile in config.profiles()? {
            store.set_profile(profile)?;
        }
        Ok(store)
    }

    pub fn from_toml_str(s: &str) -> TollgateResult<Self> {
        Self::from_config(&PolicyConfig::from_toml_str(s)?)
    }

    pub fn from_file(path: &Path) -> TollgateResult<Self> {
        Self::from_config(&PolicyConfig::from_file(path)?)
    }

    /// Names of all known profiles, sorted.
    pub fn profile_names(&self) -> TollgateResult<Vec<String>> {
        let profiles = self.profiles.read().map_err(|e| TollgateError::PolicyConfig {
            reason: format!("policy store lock poisoned: {}", e),
        })?;
        let mut names: Vec<String> = profiles.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

impl PolicyStore for InMemoryPolicyStore {
    fn profile(&self, name: &str) -> TollgateResult<PolicyProfile> {
        let profiles = self.profiles.read().map_err(|e| TollgateError::PolicyConfig {
            reason: format!("policy store lock poisoned: {}", e),
        })?;
        profiles
            .get(name)
            .cloned()
            .ok_or_else(|| TollgateError::PolicyInvalid { name: name.to_string() })
    }

    fn set_profile(&self, profile: PolicyProfile) -> TollgateResult<()> {
        let mut profiles = self.profiles.write().map_err(|e| TollgateError::PolicyConfig {
            reason: format!("policy store lock poisoned: {}", e),
        })?;
        debug!(profile = %profile.name, mode = ?profile.approval_mode, "policy profile set");
        profiles.insert(profile.name.clone(), profile);
        Ok(())
    }
}
