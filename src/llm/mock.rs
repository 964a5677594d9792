//! Deterministic, fixture-driven LLM client.
//!
//! Replies are consumed in order, one per `complete` call. Once the script is
//! exhausted every call answers with a stop decision, so a run always ends.

use super::{CompletionRequest, LlmClient, LlmResponse};
use crate::error::LlmError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Reply returned when the script runs out.
const EXHAUSTED_REPLY: &str = r#"{"action": "stop", "reasoning": "mock script exhausted"}"#;

/// One entry of a mock fixture file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FixtureEntry {
    Error { error: String },
    Response(LlmResponse),
}

/// Scripted LLM client for tests and offline demos.
pub struct MockLlmClient {
    replies: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLlmClient {
    pub fn new(replies: Vec<Result<LlmResponse, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Script made only of text replies.
    #[cfg(test)]
    pub fn with_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(|t| Ok(LlmResponse::text(t))).collect())
    }

    /// Load a script from a JSON array such as
    /// `[{"text": "..."}, {"tool": "read_file", "arguments": {...}}, {"error": "..."}]`.
    pub fn from_fixture(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read mock fixture: {}", path.display()))?;

        let entries: Vec<FixtureEntry> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse mock fixture: {}", path.display()))?;

        let replies = entries
            .into_iter()
            .map(|entry| match entry {
                FixtureEntry::Error { error } => Err(LlmError::Unavailable(error)),
                FixtureEntry::Response(response) => Ok(response),
            })
            .collect();

        Ok(Self::new(replies))
    }

    /// Every request received so far.
    #[cfg(test)]
    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }

    #[cfg(test)]
    pub fn remaining(&self) -> usize {
        lock(&self.replies).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn model_name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse, LlmError> {
        let count = {
            let mut requests = lock(&self.requests);
            requests.push(request.clone());
            requests.len()
        };
        debug!("Mock LLM request #{} ({} messages)", count, request.messages.len());

        lock(&self.replies)
            .pop_front()
            .unwrap_or_else(|| Ok(LlmResponse::text(EXHAUSTED_REPLY)))
    }
}
