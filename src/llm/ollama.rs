//! Ollama chat API adapter.
//!
//! Sends non-streaming `/api/chat` requests. When tools are attached they are
//! sent in function-calling format and a returned tool call takes precedence
//! over the message text.

use super::{ChatMessage, CompletionRequest, LlmClient, LlmResponse};
use crate::error::LlmError;
use crate::models::ToolSpec;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Connection settings for the Ollama adapter.
#[derive(Debug, Clone)]
pub struct OllamaSettings {
    pub ollama_url: String,
    pub model_name: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            model_name: "llama3.2:latest".to_string(),
            temperature: 0.1,
            timeout_seconds: 300,
        }
    }
}

/// Tool definition for Ollama's tool-calling API.
#[derive(Debug, Clone, Serialize)]
struct ToolDefinition {
    #[serde(rename = "type")]
    tool_type: String,
    function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize)]
struct FunctionDefinition {
    name: String,
    description: String,
    parameters: Value,
}

impl From<&ToolSpec> for ToolDefinition {
    fn from(spec: &ToolSpec) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: spec.name.clone(),
                description: spec.description.clone(),
                parameters: spec.parameters_schema(),
            },
        }
    }
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDefinition>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallMessage>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallMessage {
    function: ToolCallFunction,
}

#[derive(Debug, Deserialize)]
struct ToolCallFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

impl ResponseMessage {
    fn into_response(self) -> LlmResponse {
        let first_call = self.tool_calls.and_then(|calls| calls.into_iter().next());
        match first_call {
            Some(call) => LlmResponse::ToolCall {
                tool: call.function.name,
                arguments: call.function.arguments,
            },
            None => LlmResponse::Text { text: self.content },
        }
    }
}

/// LLM client backed by a running Ollama server.
pub struct OllamaClient {
    settings: OllamaSettings,
    http_client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(settings: OllamaSettings) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            settings,
            http_client,
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout(self.settings.timeout_seconds)
        } else if e.is_connect() {
            LlmError::Connection(self.settings.ollama_url.clone())
        } else {
            LlmError::Unavailable(e.to_string())
        }
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    fn model_name(&self) -> &str {
        &self.settings.model_name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse, LlmError> {
        let url = format!("{}/api/chat", self.settings.ollama_url.trim_end_matches('/'));

        let body = OllamaChatRequest {
            model: &self.settings.model_name,
            messages: &request.messages,
            tools: request.tools.iter().map(ToolDefinition::from).collect(),
            stream: false,
            options: OllamaOptions {
                temperature: self.settings.temperature,
            },
        };

        debug!(
            "Sending chat request with {} messages and {} tools",
            request.messages.len(),
            request.tools.len()
        );

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, body });
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        Ok(chat_response.message.into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ParamSpec, ParamType, ToolKind};
    use serde_json::json;

    #[test]
    fn test_tool_definition_from_spec() {
        let spec = ToolSpec {
            name: "read_file".to_string(),
            description: "Read a file".to_string(),
            kind: ToolKind::File,
            parameters: vec![ParamSpec::required("path", ParamType::String, "Relative path")],
        };

        let value = serde_json::to_value(ToolDefinition::from(&spec)).unwrap();
        assert_eq!(value["type"], "function");
        assert_eq!(value["function"]["name"], "read_file");
        assert_eq!(value["function"]["parameters"]["required"], json!(["path"]));
    }

    #[test]
    fn test_response_prefers_tool_call() {
        let raw = json!({
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [{"function": {"name": "list_files", "arguments": {"directory": "."}}}]
            },
            "done": true
        });
        let parsed: OllamaChatResponse = serde_json::from_value(raw).unwrap();
        match parsed.message.into_response() {
            LlmResponse::ToolCall { tool, arguments } => {
                assert_eq!(tool, "list_files");
                assert_eq!(arguments["directory"], ".");
            }
            other => panic!("expected tool call, got {:?}", other),
        }
    }

    #[test]
    fn test_response_text_only() {
        let raw = json!({"message": {"role": "assistant", "content": "{\"action\": \"stop\"}"}, "done": true});
        let parsed: OllamaChatResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(
            parsed.message.into_response(),
            LlmResponse::text("{\"action\": \"stop\"}")
        );
    }

    #[test]
    fn test_client_model_name() {
        let client = OllamaClient::new(OllamaSettings::default()).unwrap();
        assert_eq!(client.model_name(), "llama3.2:latest");
    }
}
