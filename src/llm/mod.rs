//! LLM client boundary.
//!
//! The agent loop and the LLM-backed tools only see the [`LlmClient`] trait.
//! Two implementations exist: the Ollama chat API adapter and a scripted mock.

pub mod mock;
pub mod ollama;

pub use mock::MockLlmClient;
pub use ollama::{OllamaClient, OllamaSettings};

use crate::error::LlmError;
use crate::models::ToolSpec;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message in a chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A prompt plus the tools the model may select from.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    /// Empty for plain completions.
    pub tools: Vec<ToolSpec>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            tools: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }
}

/// What the model answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LlmResponse {
    /// Native tool call selected through the API.
    ToolCall {
        tool: String,
        #[serde(default)]
        arguments: Value,
    },
    /// Free text (which may itself contain a JSON decision).
    Text { text: String },
}

impl LlmResponse {
    pub fn text(text: impl Into<String>) -> Self {
        LlmResponse::Text { text: text.into() }
    }

    /// Plain-text view, used by tools that want prose back.
    pub fn into_text(self) -> String {
        match self {
            LlmResponse::Text { text } => text,
            LlmResponse::ToolCall { tool, arguments } => format!("{} {}", tool, arguments),
        }
    }
}

/// Anything that can answer a completion request.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Model identifier, for reports.
    fn model_name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_untagged_deserialize() {
        let text: LlmResponse = serde_json::from_value(json!({"text": "hello"})).unwrap();
        assert_eq!(text, LlmResponse::text("hello"));

        let call: LlmResponse =
            serde_json::from_value(json!({"tool": "read_file", "arguments": {"path": "a.py"}}))
                .unwrap();
        assert!(matches!(call, LlmResponse::ToolCall { ref tool, .. } if tool == "read_file"));
    }

    #[test]
    fn test_into_text() {
        assert_eq!(LlmResponse::text("plan").into_text(), "plan");
    }
}
