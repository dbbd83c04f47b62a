//! CLI command definitions for ps-forge.
//!
//! `ps-forge generate` runs one forge session end to end: statement,
//! evaluation, codes and full evaluation, with bounded regeneration rounds,
//! then prints a summary and optionally exports the package.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ForgeConfig;
use crate::forge::{
    DifficultyConfig, LlmGenerationService, PipelineState, ProblemPackage, ProblemPipeline,
    TracingSink,
};
use crate::llm::{LiteLlmClient, LlmProvider};

/// Competitive-programming problem generator.
#[derive(Parser)]
#[command(name = "ps-forge")]
#[command(about = "Generate competitive-programming problem packages with an LLM")]
#[command(version)]
#[command(
    long_about = "ps-forge writes a problem statement, evaluates it, generates an input generator, validator and reference solution, and audits the whole package.\n\nExample usage:\n  ps-forge generate --difficulty \"Gold III\" --tags DP,Graph --output ./problem"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Generate one problem package.
    #[command(alias = "gen")]
    Generate(GenerateArgs),
}

/// Arguments for `ps-forge generate`.
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Difficulty label, e.g. "Gold III".
    #[arg(short, long)]
    pub difficulty: String,

    /// Comma-separated algorithm tags, e.g. "DP,Graph".
    #[arg(short, long)]
    pub tags: String,

    /// Statement temperature in [0, 1] (default: FORGE_TEMPERATURE or 0.7).
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Suggested problem title.
    #[arg(long)]
    pub title_idea: Option<String>,

    /// Keywords or a short idea for the problem content.
    #[arg(long)]
    pub problem_idea: Option<String>,

    /// LLM model (default: FORGE_MODEL or the built-in default).
    #[arg(short, long)]
    pub model: Option<String>,

    /// OpenRouter API key (can also be set via OPENROUTER_API_KEY; falls back to LITELLM_* env vars).
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Attempts per capability call.
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Wait before the first retry, in milliseconds.
    #[arg(long)]
    pub initial_delay_ms: Option<u64>,

    /// Total statement rounds while the evaluation judges the statement unsuitable.
    #[arg(long, default_value = "3")]
    pub statement_rounds: u32,

    /// Total code rounds while the full evaluation reports errors.
    #[arg(long, default_value = "2")]
    pub code_rounds: u32,

    /// Continue with the last statement even if it is judged unsuitable.
    #[arg(long)]
    pub force: bool,

    /// Directory to export the package into.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output JSON summary.
    #[arg(short, long)]
    pub json: bool,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Generate(args) => run_generate_command(args).await,
    }
}

// ============================================================================
// Generate Command Implementation
// ============================================================================

/// Round limits for one session.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SessionPlan {
    pub statement_rounds: u32,
    pub code_rounds: u32,
    pub force: bool,
}

/// Result of a completed session.
#[derive(Debug, Clone)]
pub(crate) struct SessionOutcome {
    pub state: PipelineState,
    pub statement_rounds: u32,
    pub code_rounds: u32,
    pub forced: bool,
}

#[derive(Debug, Serialize)]
struct GenerateOutput {
    status: String,
    session_id: String,
    statement_rounds: u32,
    code_rounds: u32,
    forced: bool,
    errors_found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dir: Option<String>,
    package: ProblemPackage,
}

async fn run_generate_command(args: GenerateArgs) -> anyhow::Result<()> {
    let mut config = ForgeConfig::from_env()?;
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(max_retries) = args.max_retries {
        config.max_retries = max_retries;
    }
    if let Some(ms) = args.initial_delay_ms {
        config.initial_delay = Duration::from_millis(ms);
    }
    if let Some(temperature) = args.temperature {
        config.temperature = temperature;
    }
    config.validate()?;

    let mut difficulty = DifficultyConfig::new(args.difficulty, args.tags)
        .with_temperature(config.temperature);
    difficulty.title_idea = args.title_idea;
    difficulty.problem_idea = args.problem_idea;

    let llm = build_llm_client(args.api_key, &config.model)?;
    let service = Arc::new(LlmGenerationService::new(llm, config.service_config()));
    let pipeline = ProblemPipeline::new(service, config.retry_policy(), Arc::new(TracingSink));

    info!(
        session = %pipeline.session_id(),
        model = %config.model,
        difficulty = %difficulty.difficulty,
        tags = %difficulty.algorithm_tags,
        max_retries = config.max_retries,
        "Starting forge session"
    );

    let plan = SessionPlan {
        statement_rounds: args.statement_rounds.max(1),
        code_rounds: args.code_rounds.max(1),
        force: args.force,
    };
    let outcome = drive_session(&pipeline, difficulty, plan).await?;

    let package = ProblemPackage::from_state(&outcome.state)?;
    let output_dir = match args.output {
        Some(dir) => {
            package
                .write_to(&dir)
                .with_context(|| format!("Failed to export package to {}", dir.display()))?;
            Some(dir.display().to_string())
        }
        None => None,
    };

    let errors_found = outcome.state.can_regenerate_codes();
    if args.json {
        let output = GenerateOutput {
            status: if errors_found {
                "errors_found".to_string()
            } else {
                "success".to_string()
            },
            session_id: pipeline.session_id().to_string(),
            statement_rounds: outcome.statement_rounds,
            code_rounds: outcome.code_rounds,
            forced: outcome.forced,
            errors_found,
            output_dir,
            package,
        };
        let json_output = serde_json::to_string_pretty(&output)
            .map_err(|e| anyhow::anyhow!("Failed to serialize JSON output: {}", e))?;
        println!("{}", json_output);
        return Ok(());
    }

    print_summary(&outcome, &package, output_dir.as_deref());
    Ok(())
}

/// Runs the pipeline through both review stages.
///
/// The statement is regenerated while it is judged unsuitable and rounds
/// remain; codes are regenerated while the full evaluation reports errors and
/// rounds remain.
pub(crate) async fn drive_session(
    pipeline: &ProblemPipeline,
    difficulty: DifficultyConfig,
    plan: SessionPlan,
) -> anyhow::Result<SessionOutcome> {
    let mut state = pipeline.generate_statement(difficulty).await?;
    let mut statement_rounds = 1;

    while !state.can_approve() && statement_rounds < plan.statement_rounds {
        if let Some(evaluation) = state.statement_evaluation() {
            info!(
                round = statement_rounds,
                quality_score = evaluation.quality_score,
                feedback = %evaluation.feedback,
                "Statement judged unsuitable, regenerating"
            );
        }
        state = pipeline.regenerate_statement().await?;
        statement_rounds += 1;
    }

    let forced = !state.can_approve();
    state = if forced {
        let (score, feedback) = state
            .statement_evaluation()
            .map(|e| (e.quality_score, e.feedback.clone()))
            .unwrap_or_default();
        if !plan.force {
            anyhow::bail!(
                "Statement still unsuitable after {} round(s) (quality score {:.2}): {}\nRerun with --force to continue anyway.",
                statement_rounds,
                score,
                feedback
            );
        }
        warn!(quality_score = score, "Continuing with an unsuitable statement (--force)");
        pipeline.force_approve_and_generate_codes().await?
    } else {
        pipeline.approve_and_generate_codes().await?
    };

    let mut code_rounds = 1;
    while state.can_regenerate_codes() && code_rounds < plan.code_rounds {
        info!(round = code_rounds, "Full evaluation found errors, regenerating codes");
        state = pipeline.regenerate_codes_and_reevaluate().await?;
        code_rounds += 1;
    }

    if state.can_regenerate_codes() {
        warn!(
            rounds = code_rounds,
            "Full evaluation still reports errors; review the suggestions"
        );
    }

    Ok(SessionOutcome {
        state,
        statement_rounds,
        code_rounds,
        forced,
    })
}

fn print_summary(outcome: &SessionOutcome, package: &ProblemPackage, output_dir: Option<&str>) {
    println!("✓ Problem generated: {}", package.statement.title);
    println!(
        "  Limits: {} / {}",
        package.statement.time_limit, package.statement.memory_limit
    );
    if let Some(ref e) = package.statement_evaluation {
        println!(
            "  Statement: quality {:.2}, {}{}",
            e.quality_score,
            if e.is_suitable { "suitable" } else { "unsuitable" },
            if outcome.forced { " (forced)" } else { "" }
        );
    }
    if let Some(ref e) = package.full_evaluation {
        println!(
            "  Full evaluation: {}",
            if e.errors_found {
                "errors found"
            } else {
                "no errors"
            }
        );
        if e.errors_found && !e.suggestions.trim().is_empty() {
            println!("  Suggestions: {}", e.suggestions.trim());
        }
    }
    println!(
        "  Rounds: {} statement, {} code",
        outcome.statement_rounds, outcome.code_rounds
    );
    match output_dir {
        Some(dir) => println!("  Output dir: {}", dir),
        None => println!("\n{}", package.statement_markdown()),
    }
}

fn build_llm_client(api_key: Option<String>, model: &str) -> anyhow::Result<Arc<dyn LlmProvider>> {
    if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
        info!(model = %model, "Using OpenRouter with specified API key");
        return Ok(Arc::new(LiteLlmClient::openrouter(key, model)));
    }

    info!("Using LiteLLM client from environment");
    Ok(Arc::new(LiteLlmClient::from_env().map_err(|e| {
        anyhow::anyhow!(
            "Failed to initialize LLM client: {}. Please provide --api-key or set OPENROUTER_API_KEY/LITELLM_API_BASE env vars.",
            e
        )
    })?))
}
