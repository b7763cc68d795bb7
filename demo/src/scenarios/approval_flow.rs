//! Scenario 1: MCP write paused for human approval.
//!
//! Sub-case A: a `write_file` call through a hosted MCP tool (which requires
//!             approval by default) suspends the run; a reviewer approves and
//!             the run resumes with the single-use token.
//! Sub-case B: the same token is replayed and rejected.
//! Sub-case C: a second run is denied by the reviewer and dropped.

use std::sync::Arc;

use serde_json::json;

use tollgate_audit::InMemoryAuditWriter;
use tollgate_contracts::{
    approval::ApprovalDecision,
    error::{TollgateError, TollgateResult},
    execution::RequestedToolCall,
};
use tollgate_core::{
    agent::Agent,
    runner::{AgentRunner, RunOptions},
    tools::{discover_mcp_tool, HostedMcpOptions},
    RunnerConfig,
};
use tollgate_policy::{InMemoryPolicyStore, SafetyGate};

use super::{print_audit, MemoryFilesystem};

fn write_readme(content: &str) -> RequestedToolCall {
    RequestedToolCall::new("mcp.filesystem").with_args(json!({
        "toolName": "write_file",
        "args": { "path": "README.md", "content": content }
    }))
}

pub async fn run_scenario() -> TollgateResult<()> {
    println!("=== Scenario 1: Approval Flow ===");
    println!();

    let filesystem = MemoryFilesystem::new();
    // Capabilities come from the server's tools/list.
    let tool = discover_mcp_tool(
        filesystem.clone(),
        HostedMcpOptions {
            name: Some("mcp.filesystem".to_string()),
            ..HostedMcpOptions::default()
        },
    )
    .await?;
    let agent = Arc::new(Agent::builder("docs-editor", "Keep the README current.").tool(tool).build()?);

    let audit = Arc::new(InMemoryAuditWriter::new());
    let gate = SafetyGate::allow_all(Arc::new(InMemoryPolicyStore::new()));
    let runner = AgentRunner::new(Arc::new(gate), RunnerConfig::default()).with_audit(audit.clone());

    // ── Sub-case A: suspend, approve, resume ─────────────────────────────────

    println!("  Sub-case A: MCP write under the balanced profile");
    let paused = runner
        .run(
            agent.clone(),
            "Update the README title",
            RunOptions::new().with_tool_call(write_readme("# Tollgate runtime\n")),
        )
        .await?;

    let approval = paused
        .interruptions
        .first()
        .cloned()
        .ok_or_else(|| TollgateError::runner("expected the run to pause for approval"))?;
    println!("  Run:                    {}", paused.run_id);
    println!("  Output:                 {}", paused.output_text);
    println!("  Approval:               {} ({})", approval.approval_id, approval.prompt);
    println!(
        "  Pending approvals:      {}",
        runner.pending_approvals(Some(&paused.run_id))?.len()
    );

    let token = runner.submit_approval(
        &approval.approval_id,
        ApprovalDecision::Approve,
        Some("title change is fine".to_string()),
    )?;
    println!("  Resume token:           {} (expires {})", token.token, token.expires_at);

    let resumed = runner.resume_run(&paused.run_id, &token.token).await?;
    println!("  Resumed output:         {}", resumed.output_text);
    println!("  Tool calls executed:    {}", resumed.tool_calls.len());
    println!(
        "  README.md now:          {:?}",
        filesystem.contents("README.md").unwrap_or_default()
    );
    print_audit(&audit, &paused.run_id)?;
    println!();

    // ── Sub-case B: replayed token ───────────────────────────────────────────

    println!("  Sub-case B: replaying the used resume token");
    match runner.resume_run(&paused.run_id, &token.token).await {
        Err(e) => println!("  REJECTED [{}]: {}", e.code(), e),
        Ok(_) => return Err(TollgateError::runner("a used resume token was accepted")),
    }
    println!();

    // ── Sub-case C: reviewer denies ──────────────────────────────────────────

    println!("  Sub-case C: reviewer denies a second write");
    let paused = runner
        .run(
            agent,
            "Wipe the README",
            RunOptions::new().with_tool_call(write_readme("")),
        )
        .await?;
    let approval_id = paused
        .interruptions
        .first()
        .map(|a| a.approval_id.clone())
        .ok_or_else(|| TollgateError::runner("expected the run to pause for approval"))?;

    match runner
        .approve_and_resume(
            &paused.run_id,
            &approval_id,
            Some(ApprovalDecision::Deny),
            Some("do not wipe files".to_string()),
        )
        .await
    {
        Err(TollgateError::GateDenied { reason }) => println!("  DENIED: {}", reason),
        Err(e) => return Err(e),
        Ok(_) => return Err(TollgateError::runner("a denied run completed")),
    }
    println!(
        "  Suspended state kept:   {}",
        runner.suspended_run(&paused.run_id)?.is_some()
    );
    print_audit(&audit, &paused.run_id)?;
    println!();

    Ok(())
}
