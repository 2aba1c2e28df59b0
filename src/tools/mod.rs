//! Tool system
//!
//! A tool is an opaque named callable with JSON-schema parameters. The
//! registry binds concrete implementations at registration and looks them
//! up by name at call time; execution is wrapped with a timeout and a
//! result-size limit so infrastructure failures (not tool logic failures)
//! are the only ones that propagate.

pub mod builtin;

pub use builtin::{DoneTool, DONE_TOOL_NAME};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ClusterError;

const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RESULT_BYTES: usize = 1_000_000;

/// Execution context threaded through to a tool call.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub agent_id: String,
    pub session_id: Option<String>,
    pub tenant_id: Option<String>,
    pub metadata: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub content: Value,
    pub error: Option<String>,
}

impl ToolOutput {
    pub fn success(content: Value) -> Self {
        Self { success: true, content, error: None }
    }

    pub fn success_str(content: impl Into<String>) -> Self {
        Self::success(Value::String(content.into()))
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { success: false, content: Value::Null, error: Some(error.into()) }
    }
}

/// Static description of a tool, the shape the LLM provider is handed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    /// If set, only the most recent N result messages for this tool are
    /// kept in an agent's transcript; older pairs are trimmed.
    pub ephemeral_retain: Option<usize>,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Value;

    /// Declares this tool ephemeral-N. `None` means results are never
    /// trimmed from the transcript.
    fn ephemeral_retain(&self) -> Option<usize> {
        None
    }

    /// Per-call timeout; falls back to the registry default.
    fn timeout(&self) -> Duration {
        DEFAULT_TOOL_TIMEOUT
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolOutput, ClusterError>;

    fn requires_confirmation(&self) -> bool {
        false
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
            ephemeral_retain: self.ephemeral_retain(),
        }
    }
}

#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Run a single tool call with a timeout and result-size cap. Tool
    /// logic failures are returned as a failed `ToolOutput` so the model
    /// can react to them; only infrastructure failures (missing tool,
    /// timeout, oversize) become a [`ClusterError`].
    pub async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<ToolOutput, ClusterError> {
        let tool = self.get_tool(&call.name).ok_or_else(|| ClusterError::ToolValidation {
            tool: call.name.clone(),
            message: "unknown tool".into(),
        })?;

        let fut = tool.execute(call.arguments.clone(), ctx);
        let output = tokio::time::timeout(tool.timeout(), fut)
            .await
            .map_err(|_| ClusterError::ToolTimeout { tool: call.name.clone() })??;

        let size = serde_json::to_vec(&output.content).map(|v| v.len()).unwrap_or(0);
        if size > MAX_RESULT_BYTES {
            return Err(ClusterError::ToolResultTooLarge { tool: call.name.clone(), size });
        }
        Ok(output)
    }

    /// Run several tool calls concurrently, preserving call order in the
    /// returned vector.
    pub async fn execute_parallel(
        &self,
        calls: &[ToolCall],
        ctx: &ToolContext,
    ) -> Vec<Result<ToolOutput, ClusterError>> {
        let futures = calls.iter().map(|call| self.execute(call, ctx));
        futures::future::join_all(futures).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockTool;

    #[async_trait]
    impl Tool for MockTool {
        fn name(&self) -> &str {
            "mock"
        }
        fn description(&self) -> &str {
            "a mock tool"
        }
        fn parameters(&self) -> Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _input: Value, _ctx: &ToolContext) -> Result<ToolOutput, ClusterError> {
            Ok(ToolOutput::success_str("ok"))
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "a tool that never returns in time"
        }
        fn parameters(&self) -> Value {
            Value::Null
        }
        fn timeout(&self) -> Duration {
            Duration::from_millis(10)
        }
        async fn execute(&self, _input: Value, _ctx: &ToolContext) -> Result<ToolOutput, ClusterError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(ToolOutput::success_str("too late"))
        }
    }

    #[tokio::test]
    async fn execute_unknown_tool_is_a_validation_error() {
        let registry = ToolRegistry::new();
        let call = ToolCall { id: "1".into(), name: "missing".into(), arguments: Value::Null };
        let result = registry.execute(&call, &ToolContext::default()).await;
        assert!(matches!(result, Err(ClusterError::ToolValidation { .. })));
    }

    #[tokio::test]
    async fn execute_runs_registered_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(MockTool));
        let call = ToolCall { id: "1".into(), name: "mock".into(), arguments: Value::Null };
        let output = registry.execute(&call, &ToolContext::default()).await.unwrap();
        assert!(output.success);
    }

    #[tokio::test]
    async fn execute_times_out() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(SlowTool));
        let call = ToolCall { id: "1".into(), name: "slow".into(), arguments: Value::Null };
        let result = registry.execute(&call, &ToolContext::default()).await;
        assert!(matches!(result, Err(ClusterError::ToolTimeout { .. })));
    }
}
