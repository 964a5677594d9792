//! Name-to-tool mapping used for dispatch.
//!
//! The registry is built once and then shared read-only (`Arc<ToolRegistry>`);
//! it keeps no per-call state, so dispatching the same call twice yields two
//! independent results.

use super::Tool;
use crate::error::{AgentError, ToolError};
use crate::models::{ToolResult, ToolSpec};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

struct RegisteredTool {
    spec: ToolSpec,
    executor: Arc<dyn Tool>,
}

/// Registered tools in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under the name from its spec.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<(), AgentError> {
        self.register_shared(Arc::new(tool))
    }

    pub fn register_shared(&mut self, tool: Arc<dyn Tool>) -> Result<(), AgentError> {
        let spec = tool.describe();

        if self.index.contains_key(&spec.name) {
            return Err(AgentError::DuplicateName(spec.name));
        }

        debug!("Registered tool {} ({})", spec.name, spec.kind);
        self.index.insert(spec.name.clone(), self.tools.len());
        self.tools.push(RegisteredTool {
            spec,
            executor: tool,
        });
        Ok(())
    }

    /// Specs of all tools, in registration order.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec.clone()).collect()
    }

    pub fn spec(&self, name: &str) -> Option<&ToolSpec> {
        self.index.get(name).map(|&i| &self.tools[i].spec)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Invoke a tool by name.
    ///
    /// Fails only for unregistered names; every executor failure comes back as
    /// a failed [`ToolResult`].
    pub async fn dispatch(&self, name: &str, arguments: &Value) -> Result<ToolResult, AgentError> {
        self.dispatch_inner(name, arguments, None).await
    }

    /// Like [`dispatch`](Self::dispatch), with the executor bounded by `timeout`.
    pub async fn dispatch_with_timeout(
        &self,
        name: &str,
        arguments: &Value,
        timeout: Duration,
    ) -> Result<ToolResult, AgentError> {
        self.dispatch_inner(name, arguments, Some(timeout)).await
    }

    async fn dispatch_inner(
        &self,
        name: &str,
        arguments: &Value,
        timeout: Option<Duration>,
    ) -> Result<ToolResult, AgentError> {
        let Some(&i) = self.index.get(name) else {
            return Err(AgentError::UnknownTool(name.to_string()));
        };
        let registered = &self.tools[i];

        if let Err(e) = validate_arguments(&registered.spec, arguments) {
            debug!("Rejected arguments for {}: {}", name, e);
            return Ok(ToolResult::failure(e.to_string()));
        }

        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, registered.executor.execute(arguments)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ToolError::Timeout),
            },
            None => registered.executor.execute(arguments).await,
        };

        Ok(outcome.unwrap_or_else(|e| {
            warn!("Tool {} failed: {}", name, e);
            ToolResult::failure(e.to_string())
        }))
    }
}

/// Check arguments against a spec: object shape, required keys, declared types.
pub fn validate_arguments(spec: &ToolSpec, arguments: &Value) -> Result<(), ToolError> {
    let empty = serde_json::Map::new();
    let map = match arguments {
        Value::Object(map) => map,
        Value::Null => &empty,
        _ => {
            return Err(ToolError::InvalidArgument {
                name: "arguments".to_string(),
                reason: "expected a JSON object".to_string(),
            })
        }
    };

    for param in &spec.parameters {
        match map.get(&param.name) {
            None | Some(Value::Null) if param.required => {
                return Err(ToolError::MissingArgument(param.name.clone()));
            }
            None | Some(Value::Null) => {}
            Some(value) if !param.param_type.accepts(value) => {
                return Err(ToolError::InvalidArgument {
                    name: param.name.clone(),
                    reason: format!("expected {:?}", param.param_type).to_lowercase(),
                });
            }
            Some(_) => {}
        }
    }

    Ok(())
}
