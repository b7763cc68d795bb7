//! Runner configuration.
//!
//! Every field has a default, so an empty TOML `[runner]` table (or no table
//! at all) yields a working configuration. Loading from disk lives in
//! `tollgate-policy`, next to the profile overrides.

use serde::{Deserialize, Serialize};

use crate::approval::DEFAULT_RESUME_TOKEN_TTL_SECS;

pub const DEFAULT_POLICY_PROFILE: &str = "balanced";
pub const DEFAULT_MAX_TURNS: u32 = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Lifetime of a resume token, in seconds.
    pub resume_token_ttl_secs: i64,
    /// Profile used when a run does not name one.
    pub default_policy_profile: String,
    /// Model-loop turn budget when a run does not set one.
    pub default_max_turns: u32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            resume_token_ttl_secs: DEFAULT_RESUME_TOKEN_TTL_SECS,
            default_policy_profile: DEFAULT_POLICY_PROFILE.to_string(),
            default_max_turns: DEFAULT_MAX_TURNS,
        }
    }
}
