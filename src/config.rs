//! Configuration file handling.
//!
//! This module handles loading `.autocoder.toml` and merging it with CLI
//! arguments, then hands each component its own settings struct.

use crate::agent::AgentConfig;
use crate::cli::Args;
use crate::llm::OllamaSettings;
use crate::tools::ExecutionSettings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file name, looked up in the current directory.
pub const CONFIG_FILE_NAME: &str = ".autocoder.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Agent loop settings.
    #[serde(default)]
    pub agent: AgentLoopConfig,

    /// Workspace layout.
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Script execution settings.
    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
        }
    }
}

fn default_output() -> String {
    "autocoder_report.md".to_string()
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Ollama API URL.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Immediate re-requests after a failed call.
    #[serde(default = "default_retries")]
    pub retries: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            ollama_url: default_ollama_url(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
            retries: default_retries(),
        }
    }
}

fn default_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_timeout() -> u64 {
    300
}

fn default_retries() -> usize {
    2
}

/// Agent loop limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentLoopConfig {
    /// Maximum tool calls per run.
    #[serde(default = "default_max_calls")]
    pub max_calls: usize,

    /// Recent steps summarized into each prompt.
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Failed steps in a row before the run is aborted.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: usize,

    /// Upper bound on any single tool call, in seconds. 0 disables it.
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_seconds: u64,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            max_calls: default_max_calls(),
            history_window: default_history_window(),
            max_consecutive_failures: default_max_consecutive_failures(),
            tool_timeout_seconds: default_tool_timeout(),
        }
    }
}

fn default_max_calls() -> usize {
    15
}

fn default_history_window() -> usize {
    5
}

fn default_max_consecutive_failures() -> usize {
    3
}

fn default_tool_timeout() -> u64 {
    // Covers generate_code, which waits on the LLM itself.
    600
}

/// Workspace layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Root directory the tools may touch.
    #[serde(default = "default_workspace_root")]
    pub root: String,

    /// Where generated scripts are saved, relative to the root.
    #[serde(default = "default_solutions_dir")]
    pub solutions_dir: String,

    /// Where session and execution logs go, relative to the root.
    #[serde(default = "default_logs_dir")]
    pub logs_dir: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
            solutions_dir: default_solutions_dir(),
            logs_dir: default_logs_dir(),
        }
    }
}

fn default_workspace_root() -> String {
    "workspace".to_string()
}

fn default_solutions_dir() -> String {
    "solutions".to_string()
}

fn default_logs_dir() -> String {
    "logs".to_string()
}

/// How generated scripts are run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Interpreter program.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Extra interpreter arguments placed before the script name.
    #[serde(default)]
    pub interpreter_args: Vec<String>,

    /// Default wall-clock limit per script run, in seconds.
    #[serde(default = "default_exec_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            interpreter_args: Vec::new(),
            timeout_seconds: default_exec_timeout(),
        }
    }
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_exec_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Reject settings the agent cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.agent.max_calls == 0 {
            anyhow::bail!("[agent] max_calls must be at least 1");
        }
        if self.agent.max_consecutive_failures == 0 {
            anyhow::bail!("[agent] max_consecutive_failures must be at least 1");
        }
        if self.model.timeout_seconds == 0 {
            anyhow::bail!("[model] timeout_seconds must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.model.temperature) {
            anyhow::bail!("[model] temperature must be between 0.0 and 1.0");
        }
        if self.execution.timeout_seconds == 0 {
            anyhow::bail!("[execution] timeout_seconds must be at least 1");
        }
        Ok(())
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence, but only when given explicitly.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref url) = args.ollama_url {
            self.model.ollama_url = url.clone();
        }
        if let Some(temperature) = args.temperature {
            self.model.temperature = temperature;
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }

        if let Some(max_calls) = args.max_calls {
            self.agent.max_calls = max_calls;
        }
        if let Some(window) = args.history_window {
            self.agent.history_window = window;
        }

        if let Some(ref root) = args.workspace {
            self.workspace.root = root.display().to_string();
        }
        if let Some(ref interpreter) = args.interpreter {
            self.execution.interpreter = interpreter.clone();
        }

        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
    }

    pub fn workspace_root(&self) -> PathBuf {
        PathBuf::from(&self.workspace.root)
    }

    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            max_calls: self.agent.max_calls,
            history_window: self.agent.history_window,
            max_consecutive_failures: self.agent.max_consecutive_failures,
            llm_retries: self.model.retries,
            llm_timeout: Duration::from_secs(self.model.timeout_seconds),
            tool_timeout: match self.agent.tool_timeout_seconds {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            log_dir: Some(self.workspace_root().join(&self.workspace.logs_dir)),
        }
    }

    pub fn ollama_settings(&self) -> OllamaSettings {
        OllamaSettings {
            ollama_url: self.model.ollama_url.clone(),
            model_name: self.model.name.clone(),
            temperature: self.model.temperature,
            timeout_seconds: self.model.timeout_seconds,
        }
    }

    pub fn execution_settings(&self) -> ExecutionSettings {
        ExecutionSettings {
            interpreter: self.execution.interpreter.clone(),
            interpreter_args: self.execution.interpreter_args.clone(),
            timeout_seconds: self.execution.timeout_seconds,
            solutions_dir: self.workspace.solutions_dir.clone(),
            logs_dir: self.workspace.logs_dir.clone(),
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::tests::make_args;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.name, "llama3.2:latest");
        assert_eq!(config.model.retries, 2);
        assert_eq!(config.agent.max_calls, 15);
        assert_eq!(config.agent.history_window, 5);
        assert_eq!(config.agent.max_consecutive_failures, 3);
        assert_eq!(config.execution.interpreter, "python3");
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "custom_report.md"

[model]
name = "qwen2.5-coder:7b"
temperature = 0.2

[agent]
max_calls = 8

[execution]
interpreter = "python"
interpreter_args = ["-u"]
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "custom_report.md");
        assert_eq!(config.model.name, "qwen2.5-coder:7b");
        assert_eq!(config.model.temperature, 0.2);
        assert_eq!(config.model.timeout_seconds, 300);
        assert_eq!(config.agent.max_calls, 8);
        assert_eq!(config.agent.history_window, 5);
        assert_eq!(config.execution.interpreter_args, vec!["-u"]);
        assert_eq!(config.workspace.root, "workspace");
    }

    #[test]
    fn test_merge_only_overrides_given_args() {
        let mut config = Config::default();
        config.model.name = "from-file".to_string();
        config.agent.history_window = 7;

        let mut args = make_args();
        args.max_calls = Some(4);
        args.interpreter = Some("sh".to_string());
        config.merge_with_args(&args);

        assert_eq!(config.model.name, "from-file");
        assert_eq!(config.agent.history_window, 7);
        assert_eq!(config.agent.max_calls, 4);
        assert_eq!(config.execution.interpreter, "sh");

        args.model = Some("from-cli".to_string());
        config.merge_with_args(&args);
        assert_eq!(config.model.name, "from-cli");
    }

    #[test]
    fn test_component_settings() {
        let mut config = Config::default();
        config.workspace.root = "/tmp/ws".to_string();
        config.model.timeout_seconds = 9;

        let agent = config.agent_config();
        assert_eq!(agent.llm_retries, 2);
        assert_eq!(agent.llm_timeout, Duration::from_secs(9));
        assert_eq!(agent.log_dir, Some(PathBuf::from("/tmp/ws/logs")));
        assert_eq!(agent.tool_timeout, Some(Duration::from_secs(600)));

        config.agent.tool_timeout_seconds = 0;
        assert_eq!(config.agent_config().tool_timeout, None);

        let exec = config.execution_settings();
        assert_eq!(exec.solutions_dir, "solutions");
        assert_eq!(config.ollama_settings().timeout_seconds, 9);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[agent]\nmax_calls = 3\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.agent.max_calls, 3);

        std::fs::write(&path, "[agent\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_validate_rejects_unusable_values() {
        assert!(Config::default().validate().is_ok());

        let config: Config = toml::from_str("[agent]\nmax_calls = 0\n").unwrap();
        assert!(config.validate().is_err());

        let config: Config = toml::from_str("[agent]\nmax_consecutive_failures = 0\n").unwrap();
        assert!(config.validate().is_err());

        let config: Config = toml::from_str("[execution]\ntimeout_seconds = 0\n").unwrap();
        assert!(config.validate().is_err());

        let mut config: Config = toml::from_str("[agent]\nmax_calls = 0\n").unwrap();
        let mut args = make_args();
        args.max_calls = Some(5);
        config.merge_with_args(&args);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[agent]"));
        assert!(toml_str.contains("[workspace]"));
        assert!(toml_str.contains("[execution]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.agent.max_calls, 15);
    }
}
