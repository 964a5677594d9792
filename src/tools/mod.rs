//! Tools the agent can invoke, and the registry that dispatches them.
//!
//! Each tool is a self-contained struct holding its own dependencies
//! (workspace, LLM client, interpreter settings) and implementing [`Tool`].

pub mod code_gen;
pub mod execution;
pub mod file_tools;
pub mod registry;
pub mod thinking;

pub use code_gen::CodeGenerationTool;
pub use execution::{ExecutionSettings, ExecutionTool};
pub use file_tools::{ListFilesTool, ReadFileTool, WriteFileTool};
pub use registry::ToolRegistry;
pub use thinking::ThinkingTool;

use crate::error::{AgentError, ToolError};
use crate::llm::LlmClient;
use crate::models::{ToolResult, ToolSpec};
use crate::workspace::Workspace;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// A named capability the LLM can select.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The description shown to the LLM. Must return the same value on every call.
    fn describe(&self) -> ToolSpec;

    /// Run the tool. Errors are converted to failed results by the registry.
    async fn execute(&self, arguments: &Value) -> Result<ToolResult, ToolError>;
}

/// Build the registry with every built-in tool.
pub fn builtin_registry(
    workspace: Workspace,
    execution: ExecutionSettings,
    llm: Arc<dyn LlmClient>,
) -> Result<ToolRegistry, AgentError> {
    let mut registry = ToolRegistry::new();
    registry.register(ThinkingTool::new(llm.clone()))?;
    registry.register(CodeGenerationTool::new(
        llm,
        workspace.clone(),
        execution.solutions_dir.clone(),
    ))?;
    registry.register(ReadFileTool::new(workspace.clone()))?;
    registry.register(WriteFileTool::new(workspace.clone()))?;
    registry.register(ListFilesTool::new(workspace.clone()))?;
    registry.register(ExecutionTool::new(workspace, execution))?;
    Ok(registry)
}

pub(crate) fn required_str<'a>(args: &'a Value, name: &str) -> Result<&'a str, ToolError> {
    args.get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::MissingArgument(name.to_string()))
}

pub(crate) fn optional_str<'a>(args: &'a Value, name: &str) -> Option<&'a str> {
    args.get(name).and_then(|v| v.as_str()).filter(|s| !s.is_empty())
}

pub(crate) fn optional_bool(args: &Value, name: &str) -> Option<bool> {
    args.get(name).and_then(|v| v.as_bool())
}

pub(crate) fn optional_u64(args: &Value, name: &str) -> Option<u64> {
    args.get(name).and_then(|v| v.as_u64())
}
