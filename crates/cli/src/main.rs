//! Thin CLI front-end (spec §1, §6): parses arguments, wires a
//! [`remedy_core::Orchestrator`] from environment-configured knobs and
//! the built-in scanner adapters, drives one workflow run, and maps its
//! terminal [`remedy_core::orchestrator::WorkflowState`] to an exit code.
//!
//! Everything interesting -- the workflow graph, the fix engine, the
//! pattern store -- lives in `remedy-core`; this binary only owns
//! argument parsing, tracing setup, and the interactive approval prompt.

// CLI binaries legitimately need println! for user-facing output.
#![allow(clippy::disallowed_macros)]

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use remedy_core::approval::{FixedAnswer, InteractionPort, PolicyConfig};
use remedy_core::decision::{DecisionBridge, FallbackBridge, HttpDecisionBridge};
use remedy_core::pattern_store::PatternStore;
use remedy_core::tool::{ArtifactKind, ToolRegistry};
use remedy_core::{EngineConfig, Orchestrator};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "remedy")]
#[command(about = "Agentic security remediation engine: scan, decide, fix, verify, learn")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose (debug) logging.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scan -> analyze -> decide -> fix -> verify -> learn -> report workflow.
    Run {
        /// Repository or directory to scan and (optionally) remediate.
        #[arg(long)]
        target: PathBuf,

        /// Free-form label for this run, recorded on the `WorkflowState` and audit log.
        #[arg(long, default_value = "scan-and-fix")]
        task: String,

        /// Elevate Medium-risk fixers into the approved bucket without prompting.
        #[arg(long)]
        auto_approve_safe: bool,

        /// Approve every High/Critical-risk fix without prompting (CI override).
        #[arg(long)]
        yes: bool,

        /// Deny every fix that would otherwise need interactive approval.
        #[arg(long, conflicts_with = "yes")]
        no: bool,

        /// HTTP endpoint for the external decision engine; falls back to
        /// the deterministic pattern-store rule (spec §4.7) if unset or
        /// if the call times out / errors.
        #[arg(long)]
        decision_endpoint: Option<String>,

        /// Minimum effectiveness for a successful (exit 0) run.
        #[arg(long, default_value_t = 0.5)]
        effectiveness_target: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::registry().with(fmt::layer().with_target(false)).with(filter).init();

    match cli.command {
        Commands::Run { target, task, auto_approve_safe, yes, no, decision_endpoint, effectiveness_target } => {
            let code = run(target, task, auto_approve_safe, yes, no, decision_endpoint, effectiveness_target).await?;
            std::process::exit(code);
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run(
    target: PathBuf,
    task: String,
    auto_approve_safe: bool,
    yes: bool,
    no: bool,
    decision_endpoint: Option<String>,
    effectiveness_target: f64,
) -> Result<i32> {
    let config = EngineConfig::from_env();
    config.ensure_dirs().context("failed to create .remedy artifact directories")?;

    let registry = Arc::new(ToolRegistry::new());
    remedy_scanners::register_all(&registry);
    let normalizer = remedy_scanners::normalizer_with_builtin_tables();

    let patterns =
        Arc::new(PatternStore::open(config.pattern_store_path.join("patterns.log")).context("opening pattern store")?);

    let decision_bridge: Arc<dyn DecisionBridge> = match decision_endpoint {
        Some(endpoint) => Arc::new(HttpDecisionBridge::new(endpoint, config.decision_timeout)),
        None => Arc::new(FallbackBridge::new(patterns.clone(), ArtifactKind::PythonSource)),
    };

    let policy = PolicyConfig { auto_approve_safe, override_high_risk: yes, ..PolicyConfig::default() };

    let interaction: Arc<dyn InteractionPort> = if yes {
        Arc::new(FixedAnswer(true))
    } else if no {
        Arc::new(FixedAnswer(false))
    } else {
        Arc::new(TerminalPrompt)
    };

    let orchestrator =
        Orchestrator::new(registry, normalizer, patterns, config, decision_bridge, policy, interaction);

    let cancel = CancellationToken::new();
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_for_signal.cancel();
        }
    });

    let target_display = target.display().to_string();
    let state = tokio::time::timeout(Duration::from_secs(3600), orchestrator.run(task, target_display, cancel))
        .await
        .context("workflow exceeded the outer one-hour safety deadline")?;

    println!(
        "workflow {} finished in phase {:?} (effectiveness={:.2})",
        state.workflow_id,
        state.phase,
        state.effectiveness.unwrap_or(0.0)
    );
    for error in &state.errors {
        eprintln!("  ! {error}");
    }

    Ok(state.exit_code(effectiveness_target))
}

/// Blocking stdin prompt used for interactive `NeedsInteraction` verdicts
/// (spec §4.5, §9 "blocking semantics via the Approval Gate"). Runs the
/// blocking read on a dedicated thread so it never stalls the async
/// runtime's worker threads.
struct TerminalPrompt;

#[async_trait::async_trait]
impl InteractionPort for TerminalPrompt {
    async fn ask(&self, prompt: &str) -> bool {
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || {
            print!("{prompt} [y/N] ");
            let _ = std::io::stdout().flush();
            let mut answer = String::new();
            if std::io::stdin().read_line(&mut answer).is_err() {
                return false;
            }
            matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
        })
        .await
        .unwrap_or(false)
    }
}
