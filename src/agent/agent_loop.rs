//! The decide-dispatch-log loop.
//!
//! One run is strictly sequential: ask the LLM for a decision, dispatch the
//! chosen tool, append the step to the history and the session log, repeat.
//! The loop ends on an explicit stop, an exhausted call budget, too many
//! consecutive failed steps, or an LLM client that keeps failing.

use super::decision::parse_decision;
use super::prompt::decision_request;
use super::state::AgentState;
use crate::analysis;
use crate::error::{AgentError, LlmError};
use crate::llm::{CompletionRequest, LlmClient, LlmResponse};
use crate::models::{Decision, RunReport, RunStatus, Step, ToolCall, ToolResult, Verdict};
use crate::session::{LogEntry, SessionLog, SessionSummary};
use crate::tools::ToolRegistry;
use anyhow::{Context, Result};
use chrono::Utc;
use indicatif::ProgressBar;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Configuration for the agent loop.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum number of tool calls per run.
    pub max_calls: usize,
    /// Number of recent steps summarized into each prompt.
    pub history_window: usize,
    /// Failed steps in a row before the run is aborted.
    pub max_consecutive_failures: usize,
    /// Immediate re-requests after a failed LLM call.
    pub llm_retries: usize,
    pub llm_timeout: Duration,
    /// Bound on a single tool execution. `None` lets tools run unbounded.
    pub tool_timeout: Option<Duration>,
    /// Where session logs go. `None` disables the session log.
    pub log_dir: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_calls: 15,
            history_window: 5,
            max_consecutive_failures: 3,
            llm_retries: 2,
            llm_timeout: Duration::from_secs(300),
            tool_timeout: Some(Duration::from_secs(600)),
            log_dir: None,
        }
    }
}

/// Drives one problem to completion against a tool registry.
pub struct AgentLoop {
    config: AgentConfig,
    llm: Arc<dyn LlmClient>,
    registry: Arc<ToolRegistry>,
    progress: Option<ProgressBar>,
}

impl AgentLoop {
    pub fn new(config: AgentConfig, llm: Arc<dyn LlmClient>, registry: Arc<ToolRegistry>) -> Self {
        info!(
            "Initializing agent with model {} ({} tools, {} calls max)",
            llm.model_name(),
            registry.len(),
            config.max_calls
        );

        Self {
            config,
            llm,
            registry,
            progress: None,
        }
    }

    /// Report each step on a progress bar sized to the call budget.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        progress.set_length(self.config.max_calls as u64);
        self.progress = Some(progress);
        self
    }

    /// Run the loop for one problem.
    ///
    /// Tool, parse and LLM failures all end up in the report; an `Err` here
    /// means the session log could not be written.
    pub async fn run(&self, problem: &str) -> Result<RunReport> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let start = Instant::now();

        let mut session = match &self.config.log_dir {
            Some(dir) => Some(
                SessionLog::create(dir, &run_id)
                    .with_context(|| format!("Failed to create session log in {}", dir.display()))?,
            ),
            None => None,
        };

        info!("Starting run {}", run_id);

        let specs = self.registry.specs();
        let mut state = AgentState::new(problem, self.config.max_calls);
        let mut consecutive_failures = 0;
        let mut escalation: Option<RunStatus> = None;
        let mut last_error: Option<String> = None;

        while state.can_continue() {
            let index = state.next_index();
            debug!("Agent iteration {}", index);

            let request = decision_request(
                &state,
                self.config.max_calls,
                self.config.history_window,
                specs.clone(),
            );

            let response = match self.request_decision(&request, index, &mut session).await? {
                Ok(response) => response,
                Err(e) => {
                    warn!("{}", e);
                    last_error = Some(e.to_string());
                    escalation = Some(RunStatus::LlmUnavailable);
                    break;
                }
            };

            let step_start = Instant::now();
            let (call, result) = match parse_decision(&response) {
                Ok(Decision::Stop { reasoning }) => {
                    info!(
                        "Agent stopped: {}",
                        reasoning.as_deref().unwrap_or("no reason given")
                    );
                    append(&mut session, &LogEntry::stop(index, reasoning.clone()))?;
                    state.terminate(reasoning);
                    break;
                }
                Ok(Decision::Invoke(call)) => {
                    let result = self.dispatch(&call).await;
                    (Some(call), result)
                }
                Err(e) => {
                    warn!("Step {}: {}", index, e);
                    (None, ToolResult::failure(e.to_string()))
                }
            };

            let step = Step {
                index,
                tool_kind: call
                    .as_ref()
                    .and_then(|c| self.registry.spec(&c.name))
                    .map(|s| s.kind),
                call,
                result,
                timestamp: Utc::now(),
                duration_ms: step_start.elapsed().as_millis() as u64,
            };

            append(&mut session, &LogEntry::step(&step))?;
            self.report_progress(&step);

            let failed = !step.result.success;
            if failed {
                last_error = step.result.error.clone();
            }
            state.push_step(step);

            if failed {
                consecutive_failures += 1;
                if consecutive_failures >= self.config.max_consecutive_failures {
                    warn!(
                        "Aborting after {} consecutive failed steps",
                        consecutive_failures
                    );
                    escalation = Some(RunStatus::Aborted);
                    break;
                }
            } else {
                consecutive_failures = 0;
            }
        }

        if !state.is_terminated() && escalation.is_none() {
            info!("Call budget exhausted ({} calls)", state.call_count());
        }

        let terminated = state.is_terminated();
        let stop_reason = state.stop_reason().map(String::from);
        let history = state.into_history();
        let verdict = analysis::verdict(&history);
        let status = final_status(escalation, terminated, history.len(), &verdict);
        let duration = start.elapsed();

        let session_log = match session {
            Some(log) => {
                let path = log
                    .finalize(SessionSummary {
                        timestamp: Utc::now(),
                        total_steps: history.len(),
                        elapsed_ms: duration.as_millis() as u64,
                        status,
                        verdict: verdict.clone(),
                        last_error: last_error.clone(),
                    })
                    .context("Failed to finalize session log")?;
                Some(path.display().to_string())
            }
            None => None,
        };

        info!(
            "Run {} finished: {} ({} steps, verdict {})",
            run_id,
            status,
            history.len(),
            verdict
        );

        Ok(RunReport {
            run_id,
            problem: problem.to_string(),
            model_used: self.llm.model_name().to_string(),
            started_at,
            duration_seconds: duration.as_secs_f64(),
            max_calls: self.config.max_calls,
            status,
            terminated,
            stop_reason,
            tool_usage: analysis::tool_usage(&history),
            verdict,
            history,
            last_error,
            session_log,
        })
    }

    /// Ask the LLM, retrying immediately on failure. Every failed attempt is
    /// logged. The outer `Result` is for session-log I/O only.
    async fn request_decision(
        &self,
        request: &CompletionRequest,
        index: usize,
        session: &mut Option<SessionLog>,
    ) -> Result<std::result::Result<LlmResponse, AgentError>> {
        let attempts = self.config.llm_retries + 1;
        let mut last_error = LlmError::Unavailable("no attempt made".to_string());

        for attempt in 1..=attempts {
            let outcome = match tokio::time::timeout(self.config.llm_timeout, self.llm.complete(request)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(LlmError::Timeout(self.config.llm_timeout.as_secs())),
            };

            match outcome {
                Ok(response) => return Ok(Ok(response)),
                Err(e) => {
                    warn!("LLM request failed (attempt {}/{}): {}", attempt, attempts, e);
                    append(session, &LogEntry::llm_error(index, attempt, &e))?;
                    last_error = e;
                }
            }
        }

        Ok(Err(AgentError::LlmUnavailable {
            attempts,
            last_error,
        }))
    }

    async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        info!("Calling tool {}", call.describe());

        let dispatched = match self.config.tool_timeout {
            Some(limit) => {
                self.registry
                    .dispatch_with_timeout(&call.name, &call.arguments, limit)
                    .await
            }
            None => self.registry.dispatch(&call.name, &call.arguments).await,
        };

        match dispatched {
            Ok(result) => {
                if result.success {
                    debug!("Tool {} succeeded", call.name);
                } else {
                    debug!(
                        "Tool {} failed: {}",
                        call.name,
                        result.error.as_deref().unwrap_or("unknown error")
                    );
                }
                result
            }
            Err(e) => {
                warn!("{}", e);
                ToolResult::failure(e.to_string())
            }
        }
    }

    fn report_progress(&self, step: &Step) {
        if let Some(pb) = &self.progress {
            let mark = if step.result.success { "✓" } else { "✗" };
            pb.set_message(format!("{} {}", mark, step.decision_summary()));
            pb.inc(1);
        }
    }
}

fn append(session: &mut Option<SessionLog>, entry: &LogEntry) -> Result<()> {
    if let Some(log) = session {
        log.append(entry).context("Failed to write session log")?;
    }
    Ok(())
}

/// Escalations win; otherwise a passing verdict or an immediate stop is a
/// success and everything else is partial.
pub fn final_status(
    escalation: Option<RunStatus>,
    terminated: bool,
    steps: usize,
    verdict: &Verdict,
) -> RunStatus {
    if let Some(status) = escalation {
        return status;
    }
    if verdict.is_passed() || (terminated && steps == 0) {
        RunStatus::Success
    } else {
        RunStatus::Partial
    }
}
