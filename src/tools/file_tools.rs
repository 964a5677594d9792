//! File tools: read, write and list inside the workspace.

use super::{optional_bool, optional_str, required_str, Tool};
use crate::error::ToolError;
use crate::models::{ParamSpec, ParamType, ToolKind, ToolResult, ToolSpec};
use crate::workspace::Workspace;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::fs;
use tracing::debug;

/// Read a text file from the workspace.
pub struct ReadFileTool {
    workspace: Workspace,
}

impl ReadFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn describe(&self) -> ToolSpec {
        ToolSpec {
            name: "read_file".to_string(),
            description: "Read the contents of a text file in the workspace.".to_string(),
            kind: ToolKind::File,
            parameters: vec![ParamSpec::required(
                "path",
                ParamType::String,
                "Path relative to the workspace root, e.g. 'solutions/solution.py'",
            )],
        }
    }

    async fn execute(&self, arguments: &Value) -> Result<ToolResult, ToolError> {
        let path = required_str(arguments, "path")?;
        let full_path = self.workspace.resolve(path)?;

        if !full_path.exists() {
            return Err(ToolError::NotFound(format!("file {}", path)));
        }

        if !full_path.is_file() {
            return Err(ToolError::InvalidArgument {
                name: "path".to_string(),
                reason: format!("not a file: {}", path),
            });
        }

        let bytes = fs::read(&full_path)?;
        let size = bytes.len();
        let content = String::from_utf8(bytes)
            .map_err(|_| ToolError::Executor(format!("{} is not a UTF-8 text file", path)))?;

        debug!("Read {} ({} bytes)", path, size);

        Ok(ToolResult::success(json!({
            "path": path,
            "content": content,
            "size": size,
            "line_count": content.lines().count(),
        })))
    }
}

/// Write a text file into the workspace, creating directories as needed.
pub struct WriteFileTool {
    workspace: Workspace,
}

impl WriteFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn describe(&self) -> ToolSpec {
        ToolSpec {
            name: "write_file".to_string(),
            description: "Write content to a file in the workspace, creating directories as needed."
                .to_string(),
            kind: ToolKind::File,
            parameters: vec![
                ParamSpec::required(
                    "path",
                    ParamType::String,
                    "Path relative to the workspace root, e.g. 'solutions/solution.py'",
                ),
                ParamSpec::required("content", ParamType::String, "Content to write"),
                ParamSpec::optional(
                    "overwrite",
                    ParamType::Boolean,
                    "Whether to replace an existing file (default: true)",
                ),
            ],
        }
    }

    async fn execute(&self, arguments: &Value) -> Result<ToolResult, ToolError> {
        let path = required_str(arguments, "path")?;
        let content = required_str(arguments, "content")?;
        let overwrite = optional_bool(arguments, "overwrite").unwrap_or(true);

        let full_path = self.workspace.resolve(path)?;
        let existed = full_path.exists();

        if existed && !overwrite {
            return Err(ToolError::Executor(format!(
                "{} already exists and overwrite=false",
                path
            )));
        }

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full_path, content)?;

        debug!("Wrote {} ({} bytes)", path, content.len());

        Ok(ToolResult::success(json!({
            "path": path,
            "bytes_written": content.len(),
            "line_count": content.lines().count(),
            "created": !existed,
        })))
    }
}

/// List files and directories in the workspace.
pub struct ListFilesTool {
    workspace: Workspace,
}

impl ListFilesTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn describe(&self) -> ToolSpec {
        ToolSpec {
            name: "list_files".to_string(),
            description: "List files and directories in the workspace.".to_string(),
            kind: ToolKind::File,
            parameters: vec![
                ParamSpec::optional(
                    "directory",
                    ParamType::String,
                    "Directory relative to the workspace root. Use '.' for the root.",
                ),
                ParamSpec::optional(
                    "recursive",
                    ParamType::Boolean,
                    "Descend into subdirectories (default: false)",
                ),
            ],
        }
    }

    async fn execute(&self, arguments: &Value) -> Result<ToolResult, ToolError> {
        let dir = optional_str(arguments, "directory").unwrap_or(".");
        let recursive = optional_bool(arguments, "recursive").unwrap_or(false);

        let entries = self.workspace.list_directory(dir, recursive)?;
        Ok(ToolResult::success(Value::String(entries.join("\n"))))
    }
}
