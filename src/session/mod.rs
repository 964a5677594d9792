//! Append-only JSON Lines record of a run.
//!
//! Every record is written, flushed and synced before `append` returns, so a
//! crashed run still leaves a readable trail. The agent never reads it back.

use crate::models::{RunStatus, Step, Verdict};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const RESULT_SUMMARY_LEN: usize = 500;

/// One line of the session log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogEntry {
    /// A dispatched (or unparseable) decision and its result.
    Step {
        timestamp: DateTime<Utc>,
        step: usize,
        decision: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool: Option<String>,
        success: bool,
        result: String,
        duration_ms: u64,
    },
    /// The LLM chose to stop.
    Stop {
        timestamp: DateTime<Utc>,
        step: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        reasoning: Option<String>,
    },
    /// A failed LLM request, before or after retry.
    LlmError {
        timestamp: DateTime<Utc>,
        step: usize,
        attempt: usize,
        error: String,
    },
    /// Final record written by [`SessionLog::finalize`].
    Summary(SessionSummary),
}

impl LogEntry {
    pub fn step(step: &Step) -> Self {
        LogEntry::Step {
            timestamp: step.timestamp,
            step: step.index,
            decision: step.decision_summary(),
            tool: step.call.as_ref().map(|c| c.name.clone()),
            success: step.result.success,
            result: step.result.summary(RESULT_SUMMARY_LEN),
            duration_ms: step.duration_ms,
        }
    }

    pub fn stop(step: usize, reasoning: Option<String>) -> Self {
        LogEntry::Stop {
            timestamp: Utc::now(),
            step,
            reasoning,
        }
    }

    pub fn llm_error(step: usize, attempt: usize, error: impl ToString) -> Self {
        LogEntry::LlmError {
            timestamp: Utc::now(),
            step,
            attempt,
            error: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub timestamp: DateTime<Utc>,
    pub total_steps: usize,
    pub elapsed_ms: u64,
    pub status: RunStatus,
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// A session log file, one per run.
pub struct SessionLog {
    path: PathBuf,
    file: File,
    records: usize,
}

impl SessionLog {
    /// Create `session_<run_id>.jsonl` inside `dir`.
    pub fn create(dir: &Path, run_id: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("session_{}.jsonl", run_id));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        debug!("Session log at {}", path.display());

        Ok(Self {
            path,
            file,
            records: 0,
        })
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one record and sync it to disk.
    pub fn append(&mut self, entry: &LogEntry) -> io::Result<()> {
        let line = serde_json::to_string(entry)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(self.file, "{}", line)?;
        self.file.flush()?;
        self.file.sync_data()?;
        self.records += 1;
        Ok(())
    }

    /// Write the summary record and close the log.
    pub fn finalize(mut self, summary: SessionSummary) -> io::Result<PathBuf> {
        self.append(&LogEntry::Summary(summary))?;
        debug!("Closed session log {} ({} records)", self.path.display(), self.records);
        Ok(self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TestSummary, ToolCall, ToolKind, ToolResult};
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn read_lines(path: &Path) -> Vec<Value> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_append_and_finalize() {
        let temp_dir = TempDir::new().unwrap();
        let mut log = SessionLog::create(&temp_dir.path().join("logs"), "abc").unwrap();
        assert!(log.path().ends_with("logs/session_abc.jsonl"));

        let step = Step {
            index: 1,
            call: Some(ToolCall {
                name: "read_file".to_string(),
                arguments: json!({"path": "a.py"}),
                reasoning: None,
            }),
            tool_kind: Some(ToolKind::File),
            result: ToolResult::failure("not found: file a.py"),
            timestamp: Utc::now(),
            duration_ms: 3,
        };
        log.append(&LogEntry::step(&step)).unwrap();
        log.append(&LogEntry::llm_error(2, 1, "request timed out after 5s"))
            .unwrap();
        log.append(&LogEntry::stop(2, Some("done".to_string()))).unwrap();

        let path = log
            .finalize(SessionSummary {
                timestamp: Utc::now(),
                total_steps: 1,
                elapsed_ms: 42,
                status: RunStatus::Partial,
                verdict: Verdict::NotEvaluated,
                last_error: Some("not found: file a.py".to_string()),
            })
            .unwrap();

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0]["kind"], "step");
        assert_eq!(lines[0]["decision"], "read_file(path=a.py)");
        assert_eq!(lines[0]["success"], false);
        assert_eq!(lines[1]["kind"], "llm_error");
        assert_eq!(lines[2]["kind"], "stop");
        assert_eq!(lines[3]["kind"], "summary");
        assert_eq!(lines[3]["status"], "partial");
        assert_eq!(lines[3]["verdict"]["verdict"], "not_evaluated");
    }

    #[test]
    fn test_entries_deserialize_back() {
        let entry = LogEntry::Summary(SessionSummary {
            timestamp: Utc::now(),
            total_steps: 2,
            elapsed_ms: 10,
            status: RunStatus::Success,
            verdict: Verdict::Passed {
                tests: TestSummary { passed: 5, failed: 0 },
            },
            last_error: None,
        });
        let text = serde_json::to_string(&entry).unwrap();
        let back: LogEntry = serde_json::from_str(&text).unwrap();
        assert_eq!(back, entry);
    }
}
