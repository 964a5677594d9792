//! autocoder - LLM-driven coding agent
//!
//! A CLI tool that lets an Ollama model (or a scripted mock) solve a
//! programming problem by choosing tools one call at a time, then writes a
//! run report and a JSONL session log.
//!
//! Exit codes:
//!   0 - Run finished with status success
//!   1 - Runtime error (config, I/O, invalid arguments, etc.)
//!   2 - Run finished without success (partial, aborted, llm_unavailable)

mod agent;
mod analysis;
mod cli;
mod config;
mod error;
mod llm;
mod models;
mod report;
mod session;
mod tools;
mod workspace;

use agent::AgentLoop;
use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use indicatif::{ProgressBar, ProgressStyle};
use llm::{LlmClient, MockLlmClient, OllamaClient};
use models::{RunReport, RunStatus};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tools::ToolRegistry;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use workspace::Workspace;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("autocoder v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .autocoder.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize the model, call budget, workspace and interpreter.");
    Ok(())
}

/// Initialize logging based on verbosity settings. `RUST_LOG` wins if set.
fn init_logging(args: &Args) {
    let level = args.log_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run one problem end to end. Returns exit code (0 or 2).
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;

    let workspace = Workspace::new(config.workspace_root());
    let execution = config.execution_settings();
    let llm = build_llm_client(&args, &config)?;
    let registry = tools::builtin_registry(workspace.clone(), execution.clone(), llm.clone())?;

    if args.list_tools {
        print_tools(&registry);
        return Ok(0);
    }

    let problem = args.problem_text()?;

    workspace
        .ensure_layout(&[execution.solutions_dir.as_str(), execution.logs_dir.as_str()])
        .with_context(|| {
            format!(
                "Failed to prepare workspace at {}",
                workspace.root().display()
            )
        })?;

    let agent_config = config.agent_config();

    println!("🤖 Starting coding agent...");
    println!("   Model: {}", llm.model_name());
    if args.mock.is_none() {
        println!("   Ollama: {}", config.model.ollama_url);
    }
    println!("   Workspace: {}", workspace.root().display());
    println!(
        "   Budget: {} tool calls (history window {})",
        agent_config.max_calls, agent_config.history_window
    );
    println!("   Interpreter: {}\n", execution.interpreter);

    let mut agent = AgentLoop::new(agent_config, llm, Arc::new(registry));
    let progress = if args.quiet {
        None
    } else {
        let pb = make_progress_bar();
        agent = agent.with_progress(pb.clone());
        Some(pb)
    };

    let report = agent.run(&problem).await?;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };
    let output_path = PathBuf::from(&config.general.output);
    report::write_report(&output, &output_path)?;

    print_summary(&report, &output_path);

    if report.status == RunStatus::Success {
        Ok(0)
    } else {
        Ok(2)
    }
}

/// Pick the mock client when a fixture is given, Ollama otherwise.
fn build_llm_client(args: &Args, config: &Config) -> Result<Arc<dyn LlmClient>> {
    match &args.mock {
        Some(fixture) => {
            info!("Using mock LLM client from {}", fixture.display());
            Ok(Arc::new(MockLlmClient::from_fixture(fixture)?))
        }
        None => Ok(Arc::new(OllamaClient::new(config.ollama_settings())?)),
    }
}

fn make_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    match ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        Ok(style) => pb.set_style(style.progress_chars("#>-")),
        Err(e) => warn!("Invalid progress template: {}", e),
    }
    pb
}

fn print_tools(registry: &ToolRegistry) {
    println!("🧰 Available tools ({}):\n", registry.len());
    for spec in registry.specs() {
        println!("   {} [{}]", spec.name, spec.kind);
        println!("      {}", spec.description);
        println!("      Parameters: {}\n", spec.parameters_summary());
    }
}

fn print_summary(report: &RunReport, output_path: &Path) {
    println!("\n📊 Run Summary:");
    println!("   Status: {} {}", report.status.emoji(), report.status);
    println!("   Verdict: {}", report.verdict);
    println!(
        "   Tool calls: {}/{} ({:.0}% successful)",
        report.history.len(),
        report.max_calls,
        report.tool_usage.success_rate * 100.0
    );
    println!("   Duration: {:.1}s", report.duration_seconds);
    println!("   {}", report.summary());
    if let Some(log) = &report.session_log {
        println!("   Session log: {}", log);
    }
    println!("\n✅ Report saved to: {}", output_path.display());

    if report.status != RunStatus::Success {
        eprintln!(
            "\n⛔ Run finished with status {} (exit code 2).",
            report.status
        );
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
