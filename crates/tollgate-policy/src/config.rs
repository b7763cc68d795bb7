//! TOML configuration schema for policy profiles and runner settings.
//!
//! A `PolicyConfig` is deserialized from TOML. Its `[[profiles]]` entries are
//! applied on top of the built-in profiles, so a document only needs to list
//! what it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use tollgate_contracts::{
    capability::ToolKind,
    error::{TollgateError, TollgateResult},
    policy::{ApprovalMode, PolicyProfile},
};
use tollgate_core::config::RunnerConfig;

/// One profile as written in TOML.
///
/// Example:
/// ```toml
/// [[profiles]]
/// name = "readonly"
/// approval_mode = "risk_based"
/// allowed_tool_scopes = ["function", "skill"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub name: String,
    pub approval_mode: ApprovalMode,
    /// Omitted means every scope.
    #[serde(default)]
    pub allowed_tool_scopes: Option<Vec<ToolKind>>,
}

impl ProfileEntry {
    /// Validate the entry and turn it into a `PolicyProfile`.
    ///
    /// Names must be non-blank. `introspection` is not a scope of its own
    /// (introspection tools are scoped as functions) and is rejected.
    pub fn into_profile(self) -> TollgateResult<PolicyProfile> {
        if self.name.trim().is_empty() {
            return Err(TollgateError::PolicyConfig {
                reason: "profile name must not be empty".to_string(),
            });
        }
        let mut profile = PolicyProfile::new(self.name, self.approval_mode);
        if let Some(scopes) = self.allowed_tool_scopes {
            if scopes.contains(&ToolKind::Introspection) {
                return Err(TollgateError::PolicyConfig {
                    reason: format!(
                        "profile '{}': introspection is not a tool scope, use function",
                        profile.name
                    ),
                });
            }
            profile.allowed_tool_scopes = scopes;
        }
        Ok(profile)
    }
}

/// The top-level structure deserialized from a TOML policy file.
///
/// Example:
/// ```toml
/// [runner]
/// resume_token_ttl_secs = 300
/// default_policy_profile = "strict"
///
/// [[profiles]]
/// name = "balanced"
/// approval_mode = "always"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub profiles: Vec<ProfileEntry>,
}

impl PolicyConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `TollgateError::PolicyConfig` if the TOML is malformed or does
    /// not match the expected schema.
    pub fn from_toml_str(s: &str) -> TollgateResult<Self> {
        toml::from_str(s).map_err(|e| TollgateError::PolicyConfig {
            reason: format!("failed to parse policy TOML: {}", e),
        })
    }

    /// Read the file at `path` and parse it as TOML.
    pub fn from_file(path: &Path) -> TollgateResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| TollgateError::PolicyConfig {
            reason: format!("failed to read policy file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Validated profiles, in declaration order.
    pub fn profiles(&self) -> TollgateResult<Vec<PolicyProfile>> {
        self.profiles.iter().cloned().map(ProfileEntry::into_profile).collect()
    }
}
