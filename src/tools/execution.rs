//! Execution tool: run a workspace script and report on it.
//!
//! The script runs under the configured interpreter with a wall-clock limit.
//! Stdout, stderr and the exit code are returned verbatim, and every run is
//! also written to a timestamped log file under the logs directory.
//!
//! Test outcomes are read from a single explicit marker line printed by the
//! script: `TEST_SUMMARY: {"passed": <n>, "failed": <m>}`. The last such line
//! wins; nothing else in the output is interpreted.

use super::{optional_str, optional_u64, required_str, Tool};
use crate::error::ToolError;
use crate::models::{ParamSpec, ParamType, TestSummary, ToolKind, ToolResult, ToolSpec};
use crate::workspace::Workspace;
use async_trait::async_trait;
use chrono::Local;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Prefix of the line a script prints to report its test counts.
pub const TEST_SUMMARY_MARKER: &str = "TEST_SUMMARY:";

/// How scripts are run.
#[derive(Debug, Clone)]
pub struct ExecutionSettings {
    /// Program used to run scripts (e.g. `python3`).
    pub interpreter: String,
    /// Extra arguments placed before the script name.
    pub interpreter_args: Vec<String>,
    /// Default wall-clock limit per run.
    pub timeout_seconds: u64,
    /// Default directory for scripts, relative to the workspace root.
    pub solutions_dir: String,
    /// Where execution logs go, relative to the workspace root.
    pub logs_dir: String,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            interpreter_args: Vec::new(),
            timeout_seconds: 30,
            solutions_dir: "solutions".to_string(),
            logs_dir: "logs".to_string(),
        }
    }
}

/// Captured result of one process run.
struct ProcessOutcome {
    stdout: String,
    stderr: String,
    exit_code: i32,
}

/// Runs scripts from the workspace.
pub struct ExecutionTool {
    workspace: Workspace,
    settings: ExecutionSettings,
}

impl ExecutionTool {
    pub fn new(workspace: Workspace, settings: ExecutionSettings) -> Self {
        Self {
            workspace,
            settings,
        }
    }

    fn script_path(&self, arguments: &Value) -> Result<(String, PathBuf), ToolError> {
        let filename = required_str(arguments, "filename")?;
        let directory = optional_str(arguments, "directory").unwrap_or(&self.settings.solutions_dir);

        let relative = if directory == "." {
            filename.to_string()
        } else {
            format!("{}/{}", directory.trim_end_matches('/'), filename)
        };

        let full_path = self.workspace.resolve(&relative)?;
        Ok((relative, full_path))
    }

    async fn run_process(&self, script: &Path, timeout: Duration) -> Result<ProcessOutcome, ToolError> {
        let file_name = script
            .file_name()
            .ok_or_else(|| ToolError::NotFound(script.display().to_string()))?;
        let working_dir = script.parent().unwrap_or(self.workspace.root());

        let child = Command::new(&self.settings.interpreter)
            .args(&self.settings.interpreter_args)
            .arg(file_name)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ToolError::Executor(format!("failed to start '{}': {}", self.settings.interpreter, e))
            })?;

        // Dropping the future on timeout kills the child.
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => return Err(ToolError::Timeout),
        };

        Ok(ProcessOutcome {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    /// Write the execution log; returns its workspace-relative path.
    fn write_log(&self, relative_script: &str, body: &str) -> Option<String> {
        let stamp = Local::now().format("%Y%m%d_%H%M%S_%3f");
        let relative = format!("{}/execution_{}.log", self.settings.logs_dir, stamp);

        let result = self.workspace.resolve(&relative).and_then(|path| {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, body)?;
            Ok(())
        });

        match result {
            Ok(()) => Some(relative),
            Err(e) => {
                warn!("Could not write execution log for {}: {}", relative_script, e);
                None
            }
        }
    }
}

#[async_trait]
impl Tool for ExecutionTool {
    fn describe(&self) -> ToolSpec {
        ToolSpec {
            name: "execute_code".to_string(),
            description: format!(
                "Run a script from the workspace with '{}' and return stdout, stderr, exit code and the test summary.",
                self.settings.interpreter
            ),
            kind: ToolKind::Execute,
            parameters: vec![
                ParamSpec::required("filename", ParamType::String, "Script file to execute"),
                ParamSpec::optional(
                    "directory",
                    ParamType::String,
                    &format!(
                        "Directory containing the file (default: '{}')",
                        self.settings.solutions_dir
                    ),
                ),
                ParamSpec::optional(
                    "timeout",
                    ParamType::Integer,
                    &format!(
                        "Maximum execution time in seconds (default: {})",
                        self.settings.timeout_seconds
                    ),
                ),
            ],
        }
    }

    async fn execute(&self, arguments: &Value) -> Result<ToolResult, ToolError> {
        let (relative, script) = self.script_path(arguments)?;

        if !script.is_file() {
            return Err(ToolError::NotFound(format!("script {}", relative)));
        }

        let timeout_secs = optional_u64(arguments, "timeout")
            .filter(|&t| t > 0)
            .unwrap_or(self.settings.timeout_seconds);

        info!("Executing {} (timeout {}s)", relative, timeout_secs);
        let started = Instant::now();
        let outcome = self
            .run_process(&script, Duration::from_secs(timeout_secs))
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(ToolError::Timeout) => {
                self.write_log(
                    &relative,
                    &format!(
                        "EXECUTION LOG\nSCRIPT: {}\nSTATUS: TIMEOUT after {}s\n",
                        relative, timeout_secs
                    ),
                );
                return Err(ToolError::Timeout);
            }
            Err(e) => return Err(e),
        };

        let tests = parse_test_summary(&outcome.stdout);
        let log_file = self.write_log(&relative, &render_log(&relative, &outcome, duration_ms, tests));

        debug!(
            "{} exited with {} in {}ms (tests: {:?})",
            relative, outcome.exit_code, duration_ms, tests
        );

        let output = json!({
            "script": relative,
            "stdout": outcome.stdout,
            "stderr": outcome.stderr,
            "exit_code": outcome.exit_code,
            "duration_ms": duration_ms,
            "log_file": log_file,
        });

        let result = if outcome.exit_code == 0 {
            ToolResult::success(output)
        } else {
            ToolResult {
                success: false,
                output,
                error: Some(format!("process exited with code {}", outcome.exit_code)),
                tests: None,
            }
        };

        Ok(result.with_tests(tests))
    }
}

/// Find the last well-formed test-summary marker in `stdout`.
pub fn parse_test_summary(stdout: &str) -> Option<TestSummary> {
    stdout.lines().rev().find_map(|line| {
        line.trim()
            .strip_prefix(TEST_SUMMARY_MARKER)
            .and_then(|rest| serde_json::from_str::<TestSummary>(rest.trim()).ok())
    })
}

fn render_log(script: &str, outcome: &ProcessOutcome, duration_ms: u64, tests: Option<TestSummary>) -> String {
    let rule = "=".repeat(60);
    let thin = "-".repeat(40);
    let status = if outcome.exit_code == 0 { "SUCCESS" } else { "FAILED" };
    let tests_line = match tests {
        Some(t) => format!("{} passed, {} failed", t.passed, t.failed),
        None => "no test summary".to_string(),
    };

    format!(
        "EXECUTION LOG - {}\n{rule}\n\nSCRIPT: {}\nEXECUTION TIME: {}ms\nEXIT CODE: {}\nSTATUS: {}\nTESTS: {}\n\nSTANDARD OUTPUT:\n{thin}\n{}\n\nSTANDARD ERROR:\n{thin}\n{}\n\n{rule}\nEND OF LOG\n",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        script,
        duration_ms,
        outcome.exit_code,
        status,
        tests_line,
        outcome.stdout,
        outcome.stderr,
    )
}
