//! Thinking tool: ask the LLM to analyze the problem and plan a solution.

use super::{optional_str, required_str, Tool};
use crate::error::ToolError;
use crate::llm::{ChatMessage, CompletionRequest, LlmClient};
use crate::models::{ParamSpec, ParamType, ToolKind, ToolResult, ToolSpec};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

const SECTIONS: [&str; 4] = ["ANALYSIS", "APPROACH", "PLAN", "PSEUDOCODE"];

pub struct ThinkingTool {
    llm: Arc<dyn LlmClient>,
}

impl ThinkingTool {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn build_prompt(problem: &str, context: Option<&str>, previous_attempts: &[String]) -> String {
        let mut prompt = format!("PROBLEM TO SOLVE:\n{}\n\n", problem);

        if let Some(context) = context {
            prompt.push_str(&format!("ADDITIONAL CONTEXT:\n{}\n\n", context));
        }

        if !previous_attempts.is_empty() {
            prompt.push_str("PREVIOUS FAILED ATTEMPTS:\n");
            for (i, attempt) in previous_attempts.iter().enumerate() {
                prompt.push_str(&format!("Attempt {}: {}\n", i + 1, attempt));
            }
            prompt.push_str("\nLearn from these failures and find a better approach.\n\n");
        }

        prompt.push_str(
            "Think through this problem systematically:\n\n\
             1. ANALYSIS: What are the inputs, outputs and constraints?\n\
             2. APPROACH: Which algorithm fits best? Consider time and space complexity.\n\
             3. PLAN: Break the solution into clear steps.\n\
             4. PSEUDOCODE: Write clear pseudocode for the solution.",
        );
        prompt
    }
}

#[async_trait]
impl Tool for ThinkingTool {
    fn describe(&self) -> ToolSpec {
        ToolSpec {
            name: "think".to_string(),
            description: "Analyze the programming problem and produce an implementation plan with pseudocode."
                .to_string(),
            kind: ToolKind::Reasoning,
            parameters: vec![
                ParamSpec::required(
                    "problem_statement",
                    ParamType::String,
                    "The programming problem to analyze",
                ),
                ParamSpec::optional(
                    "context",
                    ParamType::String,
                    "Additional context or constraints",
                ),
                ParamSpec::optional(
                    "previous_attempts",
                    ParamType::Array,
                    "Descriptions of earlier failed attempts to learn from",
                ),
            ],
        }
    }

    async fn execute(&self, arguments: &Value) -> Result<ToolResult, ToolError> {
        let problem = required_str(arguments, "problem_statement")?;
        let context = optional_str(arguments, "context");
        let previous_attempts: Vec<String> = arguments
            .get("previous_attempts")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|i| i.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        let request = CompletionRequest::new(vec![
            ChatMessage::system(THINKING_SYSTEM_PROMPT),
            ChatMessage::user(Self::build_prompt(problem, context, &previous_attempts)),
        ]);

        let thinking = self.llm.complete(&request).await?.into_text();

        Ok(ToolResult::success(json!({
            "analysis": extract_section(&thinking, "ANALYSIS"),
            "plan": extract_section(&thinking, "PLAN"),
            "pseudocode": extract_section(&thinking, "PSEUDOCODE"),
            "thinking": thinking,
        })))
    }
}

/// Text under a `SECTION:` heading, up to the next known heading.
pub fn extract_section(response: &str, section: &str) -> String {
    let mut in_section = false;
    let mut lines = Vec::new();

    for line in response.lines() {
        let heading = parse_heading(line);

        if !in_section {
            if let Some((name, rest)) = heading {
                if name.eq_ignore_ascii_case(section) {
                    in_section = true;
                    if !rest.is_empty() {
                        lines.push(rest);
                    }
                }
            }
            continue;
        }

        if heading.is_some() {
            break;
        }
        lines.push(line);
    }

    lines.join("\n").trim().to_string()
}

/// A known section name at the start of the line, followed by `:`.
/// Leading markup such as `#`, `**` or `-` is skipped. Returns the name and
/// any text after the colon.
fn parse_heading(line: &str) -> Option<(&'static str, &str)> {
    let trimmed = line.trim_start_matches(|c: char| !c.is_alphanumeric());

    SECTIONS.iter().find_map(|&name| {
        let prefix = trimmed.get(..name.len())?;
        if !prefix.eq_ignore_ascii_case(name) {
            return None;
        }
        let rest = trimmed[name.len()..].trim_start().strip_prefix(':')?;
        Some((name, rest.trim_start_matches('*').trim()))
    })
}

const THINKING_SYSTEM_PROMPT: &str = r#"You are a programming problem analysis expert. Think through coding problems systematically.

When given a problem:
1. ANALYZE the requirements carefully
2. IDENTIFY the key constraints and edge cases
3. CHOOSE the best algorithmic approach
4. CREATE a step-by-step plan
5. WRITE clear pseudocode

Be thorough but concise. Structure your response with the sections ANALYSIS:, APPROACH:, PLAN:, PSEUDOCODE:."#;
