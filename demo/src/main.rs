//! Tollgate demo CLI
//!
//! Runs one or all of the demo scenarios. Each scenario wires the real
//! Tollgate components (runner, safety gate, policy store, approval
//! controller, audit journal) to small in-process tools and models.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- approval-flow
//!   cargo run -p demo -- model-loop
//!   cargo run -p demo -- guardrails
//!   cargo run -p demo -- policy-file

mod scenarios;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tollgate_contracts::error::TollgateResult;

use scenarios::{approval_flow, guardrails, model_loop, policy_file};

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "demo",
    about = "Tollgate guarded agent runtime demo",
    long_about = "Runs Tollgate demo scenarios showing gated tool calls, human approval\n\
                  with single-use resume tokens, guardrails, policy profiles and the\n\
                  hash-chained audit journal."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every scenario in sequence.
    RunAll,
    /// Scenario 1: MCP write paused for approval, then resumed.
    ApprovalFlow,
    /// Scenario 2: Model-planned tool calls and a model-backed safety judge.
    ModelLoop,
    /// Scenario 3: Input, tool and output guardrails.
    Guardrails,
    /// Scenario 4: Profiles and runner settings loaded from TOML.
    PolicyFile,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = match cli.command {
        Command::RunAll => run_all().await,
        Command::ApprovalFlow => approval_flow::run_scenario().await,
        Command::ModelLoop => model_loop::run_scenario().await,
        Command::Guardrails => guardrails::run_scenario().await,
        Command::PolicyFile => policy_file::run_scenario().await,
    };

    match result {
        Ok(()) => println!("All selected scenarios completed successfully."),
        Err(e) => {
            eprintln!("Demo error [{}]: {}", e.code(), e);
            std::process::exit(1);
        }
    }
}

async fn run_all() -> TollgateResult<()> {
    approval_flow::run_scenario().await?;
    model_loop::run_scenario().await?;
    guardrails::run_scenario().await?;
    policy_file::run_scenario().await?;
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("Tollgate: Guarded Agent Runtime");
    println!("================================");
    println!();
    println!("Pipeline per tool call:");
    println!("  [1] Tool-stage guardrails");
    println!("  [2] Safety gate: capability snapshot → evaluator → fail-closed validation → profile");
    println!("  [3] allow ⇒ execute | deny ⇒ abort | needs_human ⇒ suspend with an approval request");
    println!("  [4] Approval mints a single-use, time-limited resume token");
    println!("  [5] Every step is journaled to a per-run SHA-256 chain");
    println!();
}
