//! Markdown and JSON run reports.
//!
//! The Markdown report is meant for people reading a finished run; the JSON
//! report is the full serialized [`RunReport`].

use crate::analysis;
use crate::models::{truncate, RunReport, RunStatus, Step, ToolUsage, Verdict};
use anyhow::{Context, Result};
use std::path::Path;

const TRAIL_SUMMARY_LEN: usize = 120;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &RunReport) -> String {
    let mut output = String::new();

    output.push_str("# Autocoder Run Report\n\n");
    output.push_str(&generate_metadata_section(report));
    output.push_str(&generate_problem_section(&report.problem));
    output.push_str(&generate_summary_section(report));
    output.push_str(&generate_usage_section(&report.tool_usage));
    output.push_str(&generate_steps_section(&report.history));

    if report.status != RunStatus::Success {
        if let Some(err) = &report.last_error {
            output.push_str(&format!("## Last Error\n\n```\n{}\n```\n\n", err));
        }
    }

    output.push_str(&generate_footer());
    output
}

fn generate_metadata_section(report: &RunReport) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Run ID:** `{}`\n", report.run_id));
    section.push_str(&format!(
        "- **Started:** {}\n",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Model Used:** `{}`\n", report.model_used));
    section.push_str(&format!(
        "- **Tool Calls:** {}/{}\n",
        report.history.len(),
        report.max_calls
    ));
    section.push_str(&format!(
        "- **Failed Steps:** {}\n",
        analysis::failure_count(&report.history)
    ));
    section.push_str(&format!("- **Duration:** {:.1}s\n", report.duration_seconds));
    if let Some(log) = &report.session_log {
        section.push_str(&format!("- **Session Log:** `{}`\n", log));
    }
    section.push('\n');

    section
}

fn generate_problem_section(problem: &str) -> String {
    format!("## Problem\n\n{}\n\n", problem.trim())
}

fn generate_summary_section(report: &RunReport) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str(&format!(
        "**Status:** {} `{}`\n\n",
        report.status.emoji(),
        report.status
    ));
    section.push_str(&format!("**Verdict:** {}\n\n", verdict_badge(&report.verdict)));
    if let Some(reason) = &report.stop_reason {
        section.push_str(&format!("**Stop Reason:** {}\n\n", reason));
    }
    section.push_str(&report.summary());
    section.push_str("\n\n");

    section
}

fn verdict_badge(verdict: &Verdict) -> String {
    match verdict {
        Verdict::Passed { .. } => format!("✅ {}", verdict),
        Verdict::Failed { .. } => format!("❌ {}", verdict),
        Verdict::NotEvaluated => format!("➖ {}", verdict),
    }
}

fn generate_usage_section(usage: &ToolUsage) -> String {
    if usage.total_calls == 0 {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Tool Usage\n\n");
    section.push_str("| Tool | Calls |\n");
    section.push_str("|:---|:---:|\n");

    let mut tools: Vec<_> = usage.by_tool.iter().collect();
    tools.sort_by_key(|(_, count)| std::cmp::Reverse(**count));

    for (tool, count) in tools {
        section.push_str(&format!("| `{}` | {} |\n", tool, count));
    }
    section.push_str(&format!(
        "\n*Success rate: {:.0}%*\n\n",
        usage.success_rate * 100.0
    ));

    section
}

fn generate_steps_section(history: &[Step]) -> String {
    let mut section = String::new();

    section.push_str("## Steps\n\n");

    if history.is_empty() {
        section.push_str("No tool calls were made.\n\n");
        return section;
    }

    section.push_str("| # | Decision | Result | Time |\n");
    section.push_str("|:---:|:---|:---|---:|\n");

    for step in history {
        let mark = if step.result.success { "✅" } else { "❌" };
        section.push_str(&format!(
            "| {} | `{}` | {} {} | {}ms |\n",
            step.index,
            escape_cell(&step.decision_summary()),
            mark,
            escape_cell(&step.result.summary(TRAIL_SUMMARY_LEN)),
            step.duration_ms
        ));
    }
    section.push('\n');

    section
}

/// Keep table cells on one line and free of column separators.
fn escape_cell(text: &str) -> String {
    truncate(&text.replace('|', "\\|").replace(['\n', '\r'], " "), TRAIL_SUMMARY_LEN + 3)
}

fn generate_footer() -> String {
    format!(
        "---\n\n*Report generated by autocoder v{}*\n",
        env!("CARGO_PKG_VERSION")
    )
}

/// Generate a JSON report.
pub fn generate_json_report(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write the report in the requested format.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TestSummary, ToolCall, ToolKind, ToolResult};
    use chrono::Utc;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_report(status: RunStatus) -> RunReport {
        let history = vec![
            Step {
                index: 1,
                call: Some(ToolCall {
                    name: "write_file".to_string(),
                    arguments: json!({"path": "solutions/s.py"}),
                    reasoning: None,
                }),
                tool_kind: Some(ToolKind::File),
                result: ToolResult::success(json!("line one\nline | two")),
                timestamp: Utc::now(),
                duration_ms: 4,
            },
            Step {
                index: 2,
                call: Some(ToolCall {
                    name: "execute_code".to_string(),
                    arguments: json!({"filename": "s.py"}),
                    reasoning: None,
                }),
                tool_kind: Some(ToolKind::Execute),
                result: ToolResult::failure("process exited with code 1")
                    .with_tests(Some(TestSummary { passed: 1, failed: 2 })),
                timestamp: Utc::now(),
                duration_ms: 120,
            },
        ];

        RunReport {
            run_id: "run-1".to_string(),
            problem: "Reverse a string".to_string(),
            model_used: "test-model".to_string(),
            started_at: Utc::now(),
            duration_seconds: 3.2,
            max_calls: 15,
            status,
            terminated: true,
            stop_reason: Some("giving up".to_string()),
            verdict: analysis::verdict(&history),
            tool_usage: analysis::tool_usage(&history),
            last_error: Some("process exited with code 1".to_string()),
            history,
            session_log: Some("workspace/logs/session_run-1.jsonl".to_string()),
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let markdown = generate_markdown_report(&create_test_report(RunStatus::Partial));

        assert!(markdown.contains("# Autocoder Run Report"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("`run-1`"));
        assert!(markdown.contains("**Failed Steps:** 1"));
        assert!(markdown.contains("Reverse a string"));
        assert!(markdown.contains("**Status:** 🟡 `partial`"));
        assert!(markdown.contains("❌ failed: process exited with code 1"));
        assert!(markdown.contains("| `execute_code` | 1 |"));
        assert!(markdown.contains("## Last Error"));
        assert!(markdown.contains("session_run-1.jsonl"));
    }

    #[test]
    fn test_step_cells_are_escaped() {
        let section = generate_steps_section(&create_test_report(RunStatus::Partial).history);
        assert!(section.contains("line one line \\| two"));
        assert!(section.contains("| 2 | `execute_code(filename=s.py)` | ❌"));
    }

    #[test]
    fn test_success_hides_last_error() {
        let mut report = create_test_report(RunStatus::Success);
        report.last_error = Some("old failure".to_string());
        let markdown = generate_markdown_report(&report);
        assert!(!markdown.contains("## Last Error"));
    }

    #[test]
    fn test_empty_history() {
        let section = generate_steps_section(&[]);
        assert!(section.contains("No tool calls were made."));
        assert_eq!(generate_usage_section(&ToolUsage::default()), "");
    }

    #[test]
    fn test_generate_json_report() {
        let json = generate_json_report(&create_test_report(RunStatus::Aborted)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["status"], "aborted");
        assert_eq!(value["verdict"]["verdict"], "failed");
        assert_eq!(value["history"].as_array().unwrap().len(), 2);
        assert_eq!(value["history"][1]["result"]["tests"]["failed"], 2);
    }

    #[test]
    fn test_write_report_creates_parent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("reports/run.md");
        write_report("# hi", &path).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "# hi");
    }
}
