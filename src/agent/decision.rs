//! Turning an LLM response into a [`Decision`].
//!
//! Native tool calls are taken as is. Text responses must contain a JSON
//! object; anything else is a parse failure the loop records as a failed step.

use crate::error::AgentError;
use crate::llm::LlmResponse;
use crate::models::{Decision, ToolCall};
use serde_json::{Map, Value};

/// Tool names the model may use to mean "stop".
const STOP_NAMES: [&str; 2] = ["stop", "finish"];

pub fn parse_decision(response: &LlmResponse) -> Result<Decision, AgentError> {
    match response {
        LlmResponse::ToolCall { tool, arguments } => {
            if is_stop_name(tool) {
                return Ok(Decision::Stop {
                    reasoning: arguments
                        .get("reasoning")
                        .and_then(|v| v.as_str())
                        .map(String::from),
                });
            }
            Ok(Decision::Invoke(ToolCall {
                name: tool.clone(),
                arguments: normalize_arguments(arguments)?,
                reasoning: None,
            }))
        }
        LlmResponse::Text { text } => parse_text_decision(text),
    }
}

fn parse_text_decision(text: &str) -> Result<Decision, AgentError> {
    let json = extract_json_object(text)
        .ok_or_else(|| AgentError::DecisionParse("no JSON object in response".to_string()))?;

    let value: Value = serde_json::from_str(json)
        .map_err(|e| AgentError::DecisionParse(format!("invalid JSON: {}", e)))?;

    let obj = value
        .as_object()
        .ok_or_else(|| AgentError::DecisionParse("decision is not a JSON object".to_string()))?;

    let reasoning = obj
        .get("reasoning")
        .and_then(|v| v.as_str())
        .map(String::from);

    match obj.get("action").and_then(|v| v.as_str()) {
        Some("stop") => Ok(Decision::Stop { reasoning }),
        Some("use_tool") => invoke_from(obj, reasoning),
        Some(other) => Err(AgentError::DecisionParse(format!(
            "unknown action '{}'",
            other
        ))),
        None if obj.get("action").is_some() => Err(AgentError::DecisionParse(
            "'action' must be a string".to_string(),
        )),
        None => match obj.get("tool").and_then(|v| v.as_str()) {
            Some(_) => invoke_from(obj, reasoning),
            None => Err(AgentError::DecisionParse(
                "decision has neither 'action' nor 'tool'".to_string(),
            )),
        },
    }
}

fn invoke_from(obj: &Map<String, Value>, reasoning: Option<String>) -> Result<Decision, AgentError> {
    let name = obj
        .get("tool")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AgentError::DecisionParse("missing 'tool' name".to_string()))?;

    if is_stop_name(name) {
        return Ok(Decision::Stop { reasoning });
    }

    let arguments = obj
        .get("parameters")
        .or_else(|| obj.get("arguments"))
        .cloned()
        .unwrap_or(Value::Null);

    Ok(Decision::Invoke(ToolCall {
        name: name.to_string(),
        arguments: normalize_arguments(&arguments)?,
        reasoning,
    }))
}

/// Arguments must be an object; absent arguments become `{}`. Some models
/// send the object JSON-encoded as a string, which is accepted too.
fn normalize_arguments(arguments: &Value) -> Result<Value, AgentError> {
    match arguments {
        Value::Null => Ok(Value::Object(Map::new())),
        Value::Object(_) => Ok(arguments.clone()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(inner @ Value::Object(_)) => Ok(inner),
            _ => Err(AgentError::DecisionParse(
                "tool arguments must be a JSON object".to_string(),
            )),
        },
        _ => Err(AgentError::DecisionParse(
            "tool arguments must be a JSON object".to_string(),
        )),
    }
}

/// The slice from the first `{` to the last `}`, if any.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn is_stop_name(name: &str) -> bool {
    STOP_NAMES.iter().any(|s| name.eq_ignore_ascii_case(s))
}
