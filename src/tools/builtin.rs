//! Built-in tools registered into every agent
//!
//! `done` is the tool an agent calls to hand back its final result
//! explicitly, rather than just stopping at a plain-text answer. Every
//! [`crate::agent::ReActAgent`] gets one registered automatically;
//! `AgentConfig::require_done_tool` decides whether it's the *only* way
//! to finish.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ClusterError;
use crate::tools::{Tool, ToolContext, ToolOutput};

pub const DONE_TOOL_NAME: &str = "done";

#[derive(Debug, Deserialize)]
struct DoneParams {
    result: String,
}

pub struct DoneTool;

#[async_trait]
impl Tool for DoneTool {
    fn name(&self) -> &str {
        DONE_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Signal task completion with a final result."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": { "result": { "type": "string" } },
            "required": ["result"],
        })
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> Result<ToolOutput, ClusterError> {
        let params: DoneParams = serde_json::from_value(input).map_err(|e| ClusterError::ToolValidation {
            tool: DONE_TOOL_NAME.to_string(),
            message: e.to_string(),
        })?;
        Ok(ToolOutput::success_str(params.result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_the_result_argument() {
        let tool = DoneTool;
        let output = tool
            .execute(serde_json::json!({"result": "42"}), &ToolContext::default())
            .await
            .unwrap();
        assert!(output.success);
        assert_eq!(output.content, Value::String("42".to_string()));
    }

    #[tokio::test]
    async fn missing_result_field_is_a_validation_error() {
        let tool = DoneTool;
        let result = tool.execute(serde_json::json!({}), &ToolContext::default()).await;
        assert!(matches!(result, Err(ClusterError::ToolValidation { .. })));
    }
}
