//! Prompt construction for the decision step.

use super::state::AgentState;
use crate::analysis;
use crate::llm::{ChatMessage, CompletionRequest};
use crate::models::{truncate, ToolSpec};

const ACTION_SUMMARY_LEN: usize = 200;

/// Build the request for the next decision: system prompt, a context
/// summary and the tool list. Recent actions are limited to the last
/// `history_window` steps; the state and execution sections cover the
/// whole history.
pub fn decision_request(
    state: &AgentState,
    max_calls: usize,
    history_window: usize,
    tools: Vec<ToolSpec>,
) -> CompletionRequest {
    let user = context_summary(state, max_calls, history_window, &tools);
    CompletionRequest::new(vec![
        ChatMessage::system(DECISION_SYSTEM_PROMPT),
        ChatMessage::user(user),
    ])
    .with_tools(tools)
}

pub fn context_summary(
    state: &AgentState,
    max_calls: usize,
    history_window: usize,
    tools: &[ToolSpec],
) -> String {
    let mut prompt = String::new();

    prompt.push_str("PROBLEM TO SOLVE:\n");
    prompt.push_str(state.problem());
    prompt.push_str("\n\n");

    prompt.push_str("CURRENT PROGRESS:\n");
    prompt.push_str(&format!(
        "- Tool calls used: {}/{}\n- Tool calls remaining: {}\n\n",
        state.call_count(),
        max_calls,
        state.remaining_calls()
    ));

    prompt.push_str("CURRENT STATE:\n");
    let files = analysis::files_written(state.steps());
    if files.is_empty() {
        prompt.push_str("- Files written: none yet\n\n");
    } else {
        prompt.push_str(&format!("- Files written: {}\n\n", files.join(", ")));
    }

    prompt.push_str("EXECUTION SUMMARY:\n");
    prompt.push_str(&execution_summary(state));
    prompt.push('\n');

    prompt.push_str("RECENT ACTIONS:\n");
    let recent = state.recent(history_window);
    if recent.is_empty() {
        prompt.push_str("No previous actions\n");
    } else {
        for step in recent {
            let status = if step.result.success { "ok" } else { "failed" };
            prompt.push_str(&format!(
                "{}. {} -> {}: {}\n",
                step.index,
                step.decision_summary(),
                status,
                step.result.summary(ACTION_SUMMARY_LEN)
            ));
            if let Some(tests) = &step.result.tests {
                prompt.push_str(&format!(
                    "   tests: {} passed, {} failed\n",
                    tests.passed, tests.failed
                ));
            }
        }
    }
    prompt.push('\n');

    prompt.push_str("AVAILABLE TOOLS:\n");
    for tool in tools {
        prompt.push_str(&format!(
            "- {}: {}\n  Parameters: {}\n",
            tool.name,
            tool.description,
            truncate(&tool.parameters_summary(), 400)
        ));
    }

    prompt.push_str("\nWhat should be done next? Respond with a single JSON decision.");
    prompt
}

fn execution_summary(state: &AgentState) -> String {
    let history = state.steps();
    let Some(last) = analysis::last_execution(history) else {
        return "- No code executed yet\n".to_string();
    };

    let outcome = match last.result.output.get("exit_code").and_then(|v| v.as_i64()) {
        Some(code) => format!("exit code {}", code),
        None => last
            .result
            .error
            .clone()
            .unwrap_or_else(|| "no exit code".to_string()),
    };
    let status = if last.result.success { "succeeded" } else { "failed" };
    let tests = match last.result.tests {
        Some(t) => format!("{} passed, {} failed", t.passed, t.failed),
        None => "no test summary reported".to_string(),
    };

    format!(
        "- Executions so far: {}\n- Latest execution (step {}): {}, {}\n- Latest test result: {}\n",
        analysis::execution_count(history),
        last.index,
        status,
        outcome,
        tests
    )
}

const DECISION_SYSTEM_PROMPT: &str = r#"You are an autonomous coding agent. You solve programming problems by choosing one tool at a time.

Typical flow: think about the problem, generate code (saving it with a filename), execute it, read the output, and fix the code until every test passes.

RESPONSE FORMAT:
Respond with exactly one JSON object.

To call a tool:
{"action": "use_tool", "tool": "<tool name>", "parameters": {"<name>": "<value>"}, "reasoning": "<why>"}

To stop:
{"action": "stop", "reasoning": "<why you are satisfied>"}

RULES:
- Only use tools from the AVAILABLE TOOLS list
- Do not repeat an action that failed without changing it
- Stop once the solution executes and all of its tests pass"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ParamSpec, ParamType, Step, TestSummary, ToolCall, ToolKind, ToolResult};
    use chrono::Utc;
    use serde_json::json;

    fn spec() -> ToolSpec {
        ToolSpec {
            name: "execute_code".to_string(),
            description: "Run a script".to_string(),
            kind: ToolKind::Execute,
            parameters: vec![ParamSpec::required("filename", ParamType::String, "Script name")],
        }
    }

    fn exec_step(index: usize) -> Step {
        Step {
            index,
            call: Some(ToolCall {
                name: "execute_code".to_string(),
                arguments: json!({"filename": format!("s{}.py", index)}),
                reasoning: None,
            }),
            tool_kind: Some(ToolKind::Execute),
            result: ToolResult::failure("process exited with code 1")
                .with_tests(Some(TestSummary { passed: 2, failed: 1 })),
            timestamp: Utc::now(),
            duration_ms: 5,
        }
    }

    #[test]
    fn test_empty_history_summary() {
        let state = AgentState::new("Reverse a string", 10);
        let text = context_summary(&state, 10, 5, &[spec()]);
        assert!(text.contains("Reverse a string"));
        assert!(text.contains("Tool calls used: 0/10"));
        assert!(text.contains("No previous actions"));
        assert!(text.contains("- No code executed yet"));
        assert!(text.contains("- Files written: none yet"));
        assert!(text.contains("- execute_code: Run a script"));
        assert!(text.contains("filename (string, required)"));
    }

    #[test]
    fn test_summary_is_windowed() {
        let mut state = AgentState::new("p", 10);
        for i in 1..=4 {
            state.push_step(exec_step(i));
        }
        let text = context_summary(&state, 10, 2, &[spec()]);
        assert!(!text.contains("filename=s2.py"));
        assert!(text.contains("3. execute_code(filename=s3.py) -> failed"));
        assert!(text.contains("4. execute_code(filename=s4.py) -> failed"));
        assert!(text.contains("tests: 2 passed, 1 failed"));
    }

    #[test]
    fn test_execution_outside_window_is_still_summarized() {
        let mut state = AgentState::new("p", 10);
        state.push_step(Step {
            index: 1,
            call: Some(ToolCall {
                name: "write_file".to_string(),
                arguments: json!({"path": "solutions/s.py"}),
                reasoning: None,
            }),
            tool_kind: Some(ToolKind::File),
            result: ToolResult::success(json!({"path": "solutions/s.py", "bytes_written": 10})),
            timestamp: Utc::now(),
            duration_ms: 1,
        });
        state.push_step(Step {
            index: 2,
            call: Some(ToolCall {
                name: "execute_code".to_string(),
                arguments: json!({"filename": "s.py"}),
                reasoning: None,
            }),
            tool_kind: Some(ToolKind::Execute),
            result: ToolResult::success(json!({"exit_code": 0}))
                .with_tests(Some(TestSummary { passed: 5, failed: 0 })),
            timestamp: Utc::now(),
            duration_ms: 1,
        });
        for i in 3..=8 {
            state.push_step(Step {
                index: i,
                call: Some(ToolCall {
                    name: "read_file".to_string(),
                    arguments: json!({}),
                    reasoning: None,
                }),
                tool_kind: Some(ToolKind::File),
                result: ToolResult::success(json!("x")),
                timestamp: Utc::now(),
                duration_ms: 1,
            });
        }

        let text = context_summary(&state, 10, 5, &[spec()]);
        assert!(!text.contains("2. execute_code"));
        assert!(text.contains("- Executions so far: 1"));
        assert!(text.contains("- Latest execution (step 2): succeeded, exit code 0"));
        assert!(text.contains("- Latest test result: 5 passed, 0 failed"));
        assert!(text.contains("- Files written: solutions/s.py"));
    }

    #[test]
    fn test_failed_execution_without_exit_code() {
        let mut state = AgentState::new("p", 10);
        let mut step = exec_step(1);
        step.result = ToolResult::failure("timeout");
        state.push_step(step);

        let text = context_summary(&state, 10, 5, &[spec()]);
        assert!(text.contains("- Latest execution (step 1): failed, timeout"));
        assert!(text.contains("- Latest test result: no test summary reported"));
    }

    #[test]
    fn test_request_carries_tools() {
        let state = AgentState::new("p", 3);
        let request = decision_request(&state, 3, 5, vec![spec()]);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(request.tools.len(), 1);
    }
}
