//! Scenario 2: Model-planned tool calls.
//!
//! Sub-case A: a deterministic planner asks for `word_count`, then answers
//!             from its result (two model turns, one tool call).
//! Sub-case B: a model-backed safety judge sends the MCP call to a human
//!             and lets the skill through.
//! Sub-case C: the judge answers in prose; the gate fails closed.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use tollgate_contracts::{
    error::{TollgateError, TollgateResult},
    execution::RequestedToolCall,
};
use tollgate_core::{
    agent::Agent,
    runner::{AgentRunner, RunOptions},
    tools::{function_tool, hosted_mcp_tool, skill_tool, HostedMcpOptions, SkillManifest},
    traits::{Model, ModelRequest, ModelResponse},
    RunnerConfig,
};
use tollgate_policy::{InMemoryPolicyStore, SafetyGate};
use tollgate_verify::ModelSafetyEvaluator;

use super::MemoryFilesystem;

// ── Models ────────────────────────────────────────────────────────────────────

/// Plans one `word_count` call, then answers from its output.
struct WordCountPlanner;

#[async_trait]
impl Model for WordCountPlanner {
    fn name(&self) -> &str {
        "word-count-planner"
    }

    async fn generate(&self, request: ModelRequest<'_>) -> TollgateResult<ModelResponse> {
        match request.tool_calls.last() {
            None => Ok(ModelResponse::plan(vec![
                RequestedToolCall::new("word_count").with_args(json!({ "text": request.input_text }))
            ])),
            Some(result) => Ok(ModelResponse::text(format!(
                "Your message has {} word(s).",
                result.output["words"]
            ))),
        }
    }
}

/// A stand-in for an LLM judge: needs_human for MCP tools, allow otherwise.
/// `prose` makes it ignore the requested format.
struct RuleJudge {
    prose: bool,
}

#[async_trait]
impl Model for RuleJudge {
    fn name(&self) -> &str {
        "rule-judge"
    }

    async fn generate(&self, request: ModelRequest<'_>) -> TollgateResult<ModelResponse> {
        if self.prose {
            return Ok(ModelResponse::text("Looks harmless to me!"));
        }
        let decision = if request.input_text.contains("\"tool_kind\": \"mcp\"") {
            json!({ "decision": "needs_human", "risk_level": 4, "reason": "MCP calls touch external state", "policy_ref": "judge-v1" })
        } else {
            json!({ "decision": "allow", "risk_level": 1, "reason": "local, read-only" , "policy_ref": "judge-v1" })
        };
        Ok(ModelResponse::text(decision.to_string()))
    }
}

// ── Scenario runner ───────────────────────────────────────────────────────────

pub async fn run_scenario() -> TollgateResult<()> {
    println!("=== Scenario 2: Model Loop ===");
    println!();

    // ── Sub-case A ───────────────────────────────────────────────────────────

    {
        println!("  Sub-case A: planner model with one function tool");
        let word_count = function_tool(
            "word_count",
            "Count the words of a text",
            Some(json!({ "type": "object", "properties": { "text": { "type": "string" } } })),
            |args| async move {
                let words = args.get("text").and_then(Value::as_str).unwrap_or("").split_whitespace().count();
                Ok::<_, TollgateError>(json!({ "words": words }))
            },
        )?;
        let agent = Arc::new(
            Agent::builder("counter", "Count words with the tool.")
                .tool(word_count)
                .model(Arc::new(WordCountPlanner))
                .build()?,
        );
        let gate = SafetyGate::allow_all(Arc::new(InMemoryPolicyStore::new()));
        let runner = AgentRunner::new(Arc::new(gate), RunnerConfig::default());

        let result = runner
            .run(agent, "how many words are in this sentence", RunOptions::new())
            .await?;
        println!("  Tool calls executed:    {}", result.tool_calls.len());
        println!("  Output:                 {}", result.output_text);
        println!(
            "  Usage (est. tokens):    {} in / {} out",
            result.usage.input_tokens, result.usage.output_tokens
        );
        println!();
    }

    // ── Sub-cases B and C ────────────────────────────────────────────────────

    let rubric = [
        "Deny operations that exfiltrate secrets.",
        "Use needs_human for anything that writes outside the process.",
        "Allow read-only operations when risk is low.",
    ];
    let build_agent = || -> TollgateResult<Arc<Agent>> {
        let filesystem = hosted_mcp_tool(
            MemoryFilesystem::new(),
            HostedMcpOptions {
                name: Some("mcp.filesystem".to_string()),
                require_approval: Some(false),
                capabilities: MemoryFilesystem::capabilities(),
                ..HostedMcpOptions::default()
            },
        )?;
        let style = skill_tool(SkillManifest {
            skill_id: "style-guide".to_string(),
            name: "Style guide".to_string(),
            overview: "House style for documentation".to_string(),
            constraints: vec!["Use sentence case headings".to_string()],
            tags: vec!["docs".to_string()],
            input_schema: None,
            mode: Default::default(),
        })?;
        Ok(Arc::new(
            Agent::builder("judged-editor", "Edit docs in house style.")
                .tool(filesystem)
                .tool(style)
                .build()?,
        ))
    };
    let calls = || {
        vec![
            RequestedToolCall::new("skill.style-guide").with_args(json!({ "section": "intro" })),
            RequestedToolCall::new("mcp.filesystem").with_args(json!({
                "toolName": "read_file",
                "args": { "path": "README.md" }
            })),
        ]
    };

    {
        println!("  Sub-case B: model-backed safety judge");
        let judge = ModelSafetyEvaluator::new(Arc::new(RuleJudge { prose: false }), rubric)?;
        let gate = SafetyGate::new(Arc::new(judge), Arc::new(InMemoryPolicyStore::new()));
        let runner = AgentRunner::new(Arc::new(gate), RunnerConfig::default());

        let paused = runner
            .run(build_agent()?, "Tidy the intro", RunOptions::new().with_tool_calls(calls()))
            .await?;
        println!("  Executed before pause:  {}", paused.tool_calls.len());
        for approval in &paused.interruptions {
            println!("  Needs approval:         {} ({})", approval.tool_name, approval.prompt);
        }
        println!();
    }

    {
        println!("  Sub-case C: judge ignores the decision format");
        let judge = ModelSafetyEvaluator::new(Arc::new(RuleJudge { prose: true }), rubric)?;
        let gate = SafetyGate::new(Arc::new(judge), Arc::new(InMemoryPolicyStore::new()));
        let runner = AgentRunner::new(Arc::new(gate), RunnerConfig::default());

        match runner
            .run(build_agent()?, "Tidy the intro", RunOptions::new().with_tool_calls(calls()))
            .await
        {
            Err(e @ TollgateError::GateEvaluation { .. }) => {
                println!("  FAIL-CLOSED [{}]: {}", e.code(), e)
            }
            Err(e) => return Err(e),
            Ok(_) => return Err(TollgateError::runner("an unparseable judgment was accepted")),
        }
        println!();
    }

    Ok(())
}
