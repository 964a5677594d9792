//! Success verdict and tool-usage statistics.
//!
//! The verdict looks only at the most recent execute-class step. Earlier
//! executions do not count, even if they passed.

use crate::models::{Step, ToolKind, ToolUsage, Verdict};
use std::collections::BTreeMap;

/// Judge a run by its last execute-class step.
pub fn verdict(history: &[Step]) -> Verdict {
    let step = match last_execution(history) {
        Some(step) => step,
        None => return Verdict::NotEvaluated,
    };

    let result = &step.result;
    if !result.success {
        return Verdict::Failed {
            reason: result
                .error
                .clone()
                .unwrap_or_else(|| "execution failed".to_string()),
        };
    }

    match result.tests {
        Some(tests) if tests.all_passed() => Verdict::Passed { tests },
        Some(tests) if tests.total() == 0 => Verdict::Failed {
            reason: "no tests were run".to_string(),
        },
        Some(tests) => Verdict::Failed {
            reason: format!("{} of {} tests failed", tests.failed, tests.total()),
        },
        None => Verdict::Failed {
            reason: "no test summary reported".to_string(),
        },
    }
}

/// The most recent execute-class step.
pub fn last_execution(history: &[Step]) -> Option<&Step> {
    history
        .iter()
        .rev()
        .find(|s| s.tool_kind == Some(ToolKind::Execute))
}

pub fn execution_count(history: &[Step]) -> usize {
    history
        .iter()
        .filter(|s| s.tool_kind == Some(ToolKind::Execute))
        .count()
}

/// Workspace files successfully written so far, first write first.
pub fn files_written(history: &[Step]) -> Vec<String> {
    let mut files: Vec<String> = Vec::new();
    for step in history.iter().filter(|s| s.result.success) {
        let output = &step.result.output;
        let written = match step.tool_kind {
            Some(ToolKind::Generation) => output.get("saved_to"),
            Some(ToolKind::File) if output.get("bytes_written").is_some() => output.get("path"),
            _ => None,
        };
        if let Some(path) = written.and_then(|v| v.as_str()) {
            if !files.iter().any(|f| f == path) {
                files.push(path.to_string());
            }
        }
    }
    files
}

/// Count calls per tool.
pub fn tool_usage(history: &[Step]) -> ToolUsage {
    let mut by_tool: BTreeMap<String, usize> = BTreeMap::new();
    for step in history {
        let name = step
            .call
            .as_ref()
            .map(|c| c.name.clone())
            .unwrap_or_else(|| "<unparsed>".to_string());
        *by_tool.entry(name).or_default() += 1;
    }

    let successes = history.iter().filter(|s| s.result.success).count();
    let success_rate = if history.is_empty() {
        0.0
    } else {
        successes as f64 / history.len() as f64
    };

    // Ties resolve to the alphabetically first name.
    let most_used = by_tool
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(name, _)| name.clone());

    ToolUsage {
        total_calls: history.len(),
        by_tool,
        success_rate,
        most_used,
    }
}

pub fn failure_count(history: &[Step]) -> usize {
    history.iter().filter(|s| !s.result.success).count()
}
