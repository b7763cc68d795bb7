//! Scenario 4: Policy profiles from TOML
//!
//! Loads `policies/default.toml` on top of the built-in profiles and runs the
//! same function call under each profile, showing allow, escalation and
//! scope denial side by side.

use std::sync::Arc;

use serde_json::json;

use tollgate_contracts::{error::TollgateResult, execution::RequestedToolCall};
use tollgate_core::{
    agent::Agent,
    runner::{AgentRunner, RunOptions},
    tools::function_tool,
};
use tollgate_policy::{InMemoryPolicyStore, PolicyConfig, SafetyGate};

const DEMO_POLICY: &str = include_str!("../../policies/default.toml");

pub async fn run_scenario() -> TollgateResult<()> {
    println!("=== Scenario 4: Policy File ===");
    println!();

    let config = PolicyConfig::from_toml_str(DEMO_POLICY)?;
    let store = InMemoryPolicyStore::from_config(&config)?;
    let profiles = store.profile_names()?;
    println!("  Profiles:               {}", profiles.join(", "));
    println!(
        "  Runner:                 ttl={}s default_profile={} max_turns={}",
        config.runner.resume_token_ttl_secs, config.runner.default_policy_profile, config.runner.default_max_turns
    );
    println!();

    let runner = AgentRunner::new(Arc::new(SafetyGate::allow_all(Arc::new(store))), config.runner.clone());
    let ping = function_tool("ping", "Reply with pong", None, |_args| async {
        Ok::<_, tollgate_contracts::error::TollgateError>(json!("pong"))
    })?;
    let agent = Arc::new(Agent::builder("pinger", "Ping on request.").tool(ping).build()?);

    for profile in &profiles {
        let result = runner
            .run(
                agent.clone(),
                "ping",
                RunOptions::new()
                    .with_policy_profile(profile.clone())
                    .with_tool_call(RequestedToolCall::new("ping")),
            )
            .await;
        let outcome = match result {
            Ok(run) if run.is_interrupted() => format!("needs approval ({})", run.interruptions[0].prompt),
            Ok(run) => format!("allowed, output: {}", run.output_text),
            Err(e) => format!("{} [{}]", e, e.code()),
        };
        println!("  {:<22}  {}", profile, outcome);
    }
    println!();

    Ok(())
}
