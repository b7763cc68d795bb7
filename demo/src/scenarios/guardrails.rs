//! Scenario 3: Guardrails
//!
//! Sub-case A: an input rule rejects a prompt mentioning a password before
//!             any tool is evaluated.
//! Sub-case B: a tool-stage handler blocks calls aimed at `/etc`.
//! Sub-case C: an output rule rejects the final text after the tools ran.

use std::sync::Arc;

use serde_json::{json, Value};

use tollgate_contracts::{
    error::{TollgateError, TollgateResult},
    execution::RequestedToolCall,
};
use tollgate_core::{
    agent::Agent,
    guardrail::{guardrail_fn, guardrails_template, GuardrailVerdict, StaticRule},
    runner::{AgentRunner, RunOptions},
    tools::function_tool,
    RunnerConfig,
};
use tollgate_policy::{InMemoryPolicyStore, SafetyGate};

fn report(label: &str, result: TollgateResult<tollgate_contracts::execution::RunResult>) -> TollgateResult<()> {
    match result {
        Err(e @ TollgateError::GuardrailDenied { .. }) => {
            println!("  {label}: BLOCKED [{}]: {}", e.code(), e);
            Ok(())
        }
        Err(e) => Err(e),
        Ok(result) => {
            println!("  {label}: passed ({})", result.output_text);
            Ok(())
        }
    }
}

pub async fn run_scenario() -> TollgateResult<()> {
    println!("=== Scenario 3: Guardrails ===");
    println!();

    let read = function_tool("read_path", "Read a path", None, |args| async move {
        Ok::<_, TollgateError>(json!({ "path": args.get("path").cloned().unwrap_or(Value::Null) }))
    })?;

    let no_system_paths = guardrail_fn(|check| {
        let path = check
            .requested_call
            .and_then(|call| call.args.get("path"))
            .and_then(Value::as_str)
            .unwrap_or("");
        if path.starts_with("/etc") {
            GuardrailVerdict::deny(format!("{} is a system path", path))
        } else {
            GuardrailVerdict::allow()
        }
    });

    let guardrails = guardrails_template(
        vec![StaticRule::contains("password", "Input mentions a password.")],
        vec![StaticRule::contains("executed 2", "Batch reports are not allowed.")],
        vec![no_system_paths],
    );
    let agent = Arc::new(
        Agent::builder("guarded-reader", "Read files on request.")
            .tool(read)
            .guardrails(guardrails)
            .build()?,
    );
    let gate = SafetyGate::allow_all(Arc::new(InMemoryPolicyStore::new()));
    let runner = AgentRunner::new(Arc::new(gate), RunnerConfig::default());

    let read_call = |path: &str| RequestedToolCall::new("read_path").with_args(json!({ "path": path }));

    report(
        "Sub-case A (input) ",
        runner
            .run(
                agent.clone(),
                "what is my password?",
                RunOptions::new().with_tool_call(read_call("notes.txt")),
            )
            .await,
    )?;
    report(
        "Sub-case B (tool)  ",
        runner
            .run(
                agent.clone(),
                "show me the hosts file",
                RunOptions::new().with_tool_call(read_call("/etc/hosts")),
            )
            .await,
    )?;
    report(
        "Sub-case C (output)",
        runner
            .run(
                agent.clone(),
                "read both notes",
                RunOptions::new().with_tool_calls([read_call("a.txt"), read_call("b.txt")]),
            )
            .await,
    )?;
    report(
        "Control            ",
        runner
            .run(agent, "read one note", RunOptions::new().with_tool_call(read_call("a.txt")))
            .await,
    )?;
    println!();

    Ok(())
}
