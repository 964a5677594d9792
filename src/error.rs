//! Error taxonomy for the agent core.
//!
//! Tool and parse failures are recovered into failed steps by the agent loop;
//! only [`AgentError::LlmUnavailable`] ends a run early on its own.

use thiserror::Error;

/// Errors raised by the registry and the agent loop.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Dispatch to a name that was never registered.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Registration conflict.
    #[error("tool already registered: {0}")]
    DuplicateName(String),

    /// The LLM response did not contain a usable decision.
    #[error("could not parse decision: {0}")]
    DecisionParse(String),

    /// The LLM client kept failing after all retries.
    #[error("LLM unavailable after {attempts} attempts: {last_error}")]
    LlmUnavailable { attempts: usize, last_error: LlmError },
}

/// Errors raised inside a tool executor.
///
/// The registry never lets these escape; they are turned into a failed
/// `ToolResult` whose error is this type's display string.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("path violation: '{0}' escapes the workspace root")]
    PathViolation(String),

    #[error("missing required parameter: {0}")]
    MissingArgument(String),

    #[error("invalid parameter '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("timeout")]
    Timeout,

    #[error("executor error: {0}")]
    Executor(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("LLM request failed: {0}")]
    Llm(#[from] LlmError),
}

/// Errors from an LLM client. All of them are treated as transient by the loop.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("cannot connect to {0}")]
    Connection(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display_is_bare() {
        assert_eq!(ToolError::Timeout.to_string(), "timeout");
    }

    #[test]
    fn test_llm_unavailable_display() {
        let err = AgentError::LlmUnavailable {
            attempts: 3,
            last_error: LlmError::Connection("http://localhost:11434".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "LLM unavailable after 3 attempts: cannot connect to http://localhost:11434"
        );
    }
}
