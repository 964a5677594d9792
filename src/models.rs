//! Data models for the coding agent.
//!
//! This module contains the core data structures shared by the registry,
//! the agent loop, the session log and the report generator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Broad class of a tool, used by the evaluator to find execution results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    /// Analysis and planning, no side effects.
    Reasoning,
    /// Produces code.
    Generation,
    /// Reads or writes the workspace.
    File,
    /// Runs code and reports on it.
    Execute,
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolKind::Reasoning => write!(f, "reasoning"),
            ToolKind::Generation => write!(f, "generation"),
            ToolKind::File => write!(f, "file"),
            ToolKind::Execute => write!(f, "execute"),
        }
    }
}

/// JSON type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Boolean,
    Array,
}

impl ParamType {
    fn schema_name(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
        }
    }

    /// Whether a JSON value has this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_u64() || value.is_i64(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
        }
    }
}

/// A single named parameter of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub description: String,
    pub required: bool,
}

impl ParamSpec {
    pub fn required(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            required: true,
        }
    }

    pub fn optional(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }
}

/// Description of a tool as shown to the LLM. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub kind: ToolKind,
    pub parameters: Vec<ParamSpec>,
}

impl ToolSpec {
    /// Render the parameters as a JSON Schema object.
    pub fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            let mut prop = json!({
                "type": param.param_type.schema_name(),
                "description": param.description,
            });
            if param.param_type == ParamType::Array {
                prop["items"] = json!({ "type": "string" });
            }
            properties.insert(param.name.clone(), prop);
        }

        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// One-line parameter summary used in text prompts.
    pub fn parameters_summary(&self) -> String {
        if self.parameters.is_empty() {
            return "No parameters".to_string();
        }

        self.parameters
            .iter()
            .map(|p| {
                let req = if p.required { "required" } else { "optional" };
                format!("{} ({}, {}): {}", p.name, p.param_type.schema_name(), req, p.description)
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Counts reported by a script through the test-summary marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TestSummary {
    pub passed: u32,
    pub failed: u32,
}

impl TestSummary {
    pub fn total(&self) -> u32 {
        self.passed + self.failed
    }

    /// True when at least one test ran and none failed.
    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.passed > 0
    }
}

/// Result of executing a tool. Produced once per invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests: Option<TestSummary>,
}

impl ToolResult {
    pub fn success(output: Value) -> Self {
        Self {
            success: true,
            output,
            error: None,
            tests: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: Value::Null,
            error: Some(message.into()),
            tests: None,
        }
    }

    pub fn with_tests(mut self, tests: Option<TestSummary>) -> Self {
        self.tests = tests;
        self
    }

    /// Short human-readable summary for prompts and logs.
    pub fn summary(&self, max_len: usize) -> String {
        let text = if self.success {
            match &self.output {
                Value::String(s) => s.clone(),
                Value::Null => "ok".to_string(),
                other => other.to_string(),
            }
        } else {
            format!("Error: {}", self.error.as_deref().unwrap_or("unknown error"))
        };
        truncate(&text, max_len)
    }
}

/// A tool invocation chosen by the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl ToolCall {
    /// Compact `name(key=value, ...)` rendering; long values are elided.
    pub fn describe(&self) -> String {
        let args = match &self.arguments {
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| {
                    let rendered = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    if rendered.chars().count() < 30 {
                        format!("{}={}", k, rendered)
                    } else {
                        format!("{}=...", k)
                    }
                })
                .collect::<Vec<_>>()
                .join(", "),
            _ => String::new(),
        };
        format!("{}({})", self.name, args)
    }
}

/// The next action chosen for one loop iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Invoke(ToolCall),
    Stop { reasoning: Option<String> },
}

/// One entry in the run history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// 1-based position in the history.
    pub index: usize,
    /// `None` when the LLM response could not be parsed into a decision.
    pub call: Option<ToolCall>,
    /// Kind of the dispatched tool, if it was registered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_kind: Option<ToolKind>,
    pub result: ToolResult,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
}

impl Step {
    pub fn decision_summary(&self) -> String {
        match &self.call {
            Some(call) => call.describe(),
            None => "<unparsed decision>".to_string(),
        }
    }
}

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Partial,
    Aborted,
    LlmUnavailable,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::Partial => write!(f, "partial"),
            RunStatus::Aborted => write!(f, "aborted"),
            RunStatus::LlmUnavailable => write!(f, "llm_unavailable"),
        }
    }
}

impl RunStatus {
    pub fn emoji(&self) -> &'static str {
        match self {
            RunStatus::Success => "✅",
            RunStatus::Partial => "🟡",
            RunStatus::Aborted => "⛔",
            RunStatus::LlmUnavailable => "🔌",
        }
    }
}

/// Outcome of evaluating the execution results of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Passed { tests: TestSummary },
    Failed { reason: String },
    NotEvaluated,
}

impl Verdict {
    pub fn is_passed(&self) -> bool {
        matches!(self, Verdict::Passed { .. })
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Passed { tests } => write!(f, "passed ({}/{} tests)", tests.passed, tests.total()),
            Verdict::Failed { reason } => write!(f, "failed: {}", reason),
            Verdict::NotEvaluated => write!(f, "not evaluated"),
        }
    }
}

/// Tool usage statistics over a history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolUsage {
    pub total_calls: usize,
    pub by_tool: BTreeMap<String, usize>,
    pub success_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub most_used: Option<String>,
}

/// The complete record of one finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub problem: String,
    pub model_used: String,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub max_calls: usize,
    pub status: RunStatus,
    /// True when the LLM explicitly stopped the run.
    pub terminated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    pub verdict: Verdict,
    pub tool_usage: ToolUsage,
    pub history: Vec<Step>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_log: Option<String>,
}

impl RunReport {
    /// Human-readable description of how the run ended.
    pub fn summary(&self) -> String {
        let mut text = match self.status {
            RunStatus::Success if self.history.is_empty() => {
                "Run stopped before any tool call (trivial success).".to_string()
            }
            RunStatus::Success => format!(
                "Run succeeded after {} step(s); verdict {}.",
                self.history.len(),
                self.verdict
            ),
            RunStatus::Partial if self.terminated => format!(
                "Agent stopped after {} step(s) without a passing execution; verdict {}.",
                self.history.len(),
                self.verdict
            ),
            RunStatus::Partial => format!(
                "Call budget exhausted ({}/{}); verdict {}.",
                self.history.len(),
                self.max_calls,
                self.verdict
            ),
            RunStatus::Aborted => format!(
                "Run aborted after {} step(s) because of consecutive failures.",
                self.history.len()
            ),
            RunStatus::LlmUnavailable => format!(
                "Run ended after {} step(s): the LLM client was unavailable.",
                self.history.len()
            ),
        };

        if self.status != RunStatus::Success {
            if let Some(err) = &self.last_error {
                text.push_str(&format!(" Last error: {}", err));
            }
        }

        text
    }
}

/// Truncate to `max_len` characters, marking the cut.
pub fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_len).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_spec() -> ToolSpec {
        ToolSpec {
            name: "write_file".to_string(),
            description: "Write a file".to_string(),
            kind: ToolKind::File,
            parameters: vec![
                ParamSpec::required("path", ParamType::String, "Relative path"),
                ParamSpec::optional("overwrite", ParamType::Boolean, "Replace existing"),
            ],
        }
    }

    #[test]
    fn test_parameters_schema() {
        let schema = sample_spec().parameters_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["path"]["type"], "string");
        assert_eq!(schema["properties"]["overwrite"]["type"], "boolean");
        assert_eq!(schema["required"], json!(["path"]));
    }

    #[test]
    fn test_parameters_summary() {
        let summary = sample_spec().parameters_summary();
        assert!(summary.contains("path (string, required)"));
        assert!(summary.contains("overwrite (boolean, optional)"));
    }

    #[test]
    fn test_test_summary_all_passed() {
        assert!(TestSummary { passed: 3, failed: 0 }.all_passed());
        assert!(!TestSummary { passed: 3, failed: 1 }.all_passed());
        assert!(!TestSummary::default().all_passed());
    }

    #[test]
    fn test_tool_call_describe_elides_long_values() {
        let call = ToolCall {
            name: "write_file".to_string(),
            arguments: json!({"path": "a.py", "content": "x".repeat(100)}),
            reasoning: None,
        };
        let text = call.describe();
        assert!(text.starts_with("write_file("));
        assert!(text.contains("path=a.py"));
        assert!(text.contains("content=..."));
    }

    #[test]
    fn test_result_summary() {
        assert_eq!(ToolResult::failure("timeout").summary(100), "Error: timeout");
        assert_eq!(ToolResult::success(json!("hello world")).summary(5), "hello...");
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let s = serde_json::to_string(&RunStatus::LlmUnavailable).unwrap();
        assert_eq!(s, "\"llm_unavailable\"");
        assert_eq!(RunStatus::Partial.to_string(), "partial");
    }
}
