//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation. Values left unset fall back to the config file.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

/// autocoder - an LLM coding agent that writes, runs and fixes code
///
/// The agent picks one tool at a time (think, generate_code, read_file,
/// write_file, list_files, execute_code) until its script passes its own
/// tests, it decides to stop, or the call budget runs out.
///
/// Examples:
///   autocoder --problem "Write a function that reverses a string"
///   autocoder --problem-file problem.txt --model qwen2.5-coder:7b
///   autocoder --problem "Sum a list" --mock fixtures/mock_run.json --interpreter sh
///   autocoder --list-tools
///   autocoder --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Programming problem to solve
    #[arg(
        short,
        long,
        value_name = "TEXT",
        conflicts_with = "problem_file",
        required_unless_present_any = ["problem_file", "init_config", "list_tools"]
    )]
    pub problem: Option<String>,

    /// Read the problem statement from a file
    #[arg(long, value_name = "FILE")]
    pub problem_file: Option<PathBuf>,

    /// Ollama model to use
    ///
    /// Can also be set via AUTOCODER_MODEL env var or .autocoder.toml config.
    #[arg(short, long, env = "AUTOCODER_MODEL")]
    pub model: Option<String>,

    /// Ollama API endpoint URL
    #[arg(long, env = "OLLAMA_URL", value_name = "URL")]
    pub ollama_url: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .autocoder.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Workspace directory the agent may read, write and execute in
    #[arg(short, long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// Maximum number of tool calls for the run
    #[arg(long, value_name = "COUNT")]
    pub max_calls: Option<usize>,

    /// Number of recent steps summarized into each prompt
    #[arg(long, value_name = "STEPS")]
    pub history_window: Option<usize>,

    /// LLM request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Temperature for LLM responses (0.0 - 1.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Interpreter used to run generated scripts (default: python3)
    #[arg(long, value_name = "PROGRAM")]
    pub interpreter: Option<String>,

    /// Replay scripted LLM responses from a JSON fixture instead of calling Ollama
    #[arg(long, value_name = "FIXTURE")]
    pub mock: Option<PathBuf>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Print the available tools and exit
    #[arg(long)]
    pub list_tools: bool,

    /// Generate a default .autocoder.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref problem) = self.problem {
            if problem.trim().is_empty() {
                return Err("Problem statement must not be empty".to_string());
            }
        }

        if let Some(ref path) = self.problem_file {
            if !path.is_file() {
                return Err(format!("Problem file does not exist: {}", path.display()));
            }
        }

        if let Some(ref path) = self.mock {
            if !path.is_file() {
                return Err(format!("Mock fixture does not exist: {}", path.display()));
            }
        }

        // Validate Ollama URL format (not needed for mock runs)
        if self.mock.is_none() {
            if let Some(ref url) = self.ollama_url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
                }
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 1.0".to_string());
            }
        }

        if self.max_calls == Some(0) {
            return Err("Max calls must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// The problem statement, from `--problem` or `--problem-file`.
    pub fn problem_text(&self) -> Result<String> {
        match (&self.problem, &self.problem_file) {
            (Some(problem), _) => Ok(problem.clone()),
            (None, Some(path)) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read problem file: {}", path.display()))?;
                let text = text.trim().to_string();
                if text.is_empty() {
                    anyhow::bail!("Problem file is empty: {}", path.display());
                }
                Ok(text)
            }
            (None, None) => anyhow::bail!("No problem given; use --problem or --problem-file"),
        }
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) fn make_args() -> Args {
        Args {
            problem: Some("Reverse a string".to_string()),
            problem_file: None,
            model: None,
            ollama_url: None,
            config: None,
            workspace: None,
            max_calls: None,
            history_window: None,
            timeout: None,
            temperature: None,
            interpreter: None,
            mock: None,
            output: None,
            format: OutputFormat::Markdown,
            verbose: false,
            quiet: false,
            list_tools: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = Args::try_parse_from([
            "autocoder",
            "--problem",
            "Sum a list",
            "--max-calls",
            "4",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(args.problem.as_deref(), Some("Sum a list"));
        assert_eq!(args.max_calls, Some(4));
        assert_eq!(args.format, OutputFormat::Json);
    }

    #[test]
    fn test_problem_required_unless_utility_flag() {
        assert!(Args::try_parse_from(["autocoder"]).is_err());
        assert!(Args::try_parse_from(["autocoder", "--list-tools"]).is_ok());
        assert!(Args::try_parse_from(["autocoder", "--init-config"]).is_ok());
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut args = make_args();
        args.ollama_url = Some("localhost:11434".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_budget() {
        let mut args = make_args();
        args.max_calls = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_problem_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("problem.txt");
        std::fs::write(&path, "  Count vowels\n").unwrap();

        let mut args = make_args();
        args.problem = None;
        args.problem_file = Some(path);
        assert!(args.validate().is_ok());
        assert_eq!(args.problem_text().unwrap(), "Count vowels");
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
