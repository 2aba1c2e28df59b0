//! ReAct-style tool-use agent
//!
//! Wraps a single LLM session with tool use: gather context, call the
//! model, execute any requested tools, loop until a final answer or a
//! guardrail trips.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agent::provider::{CompletionParams, FinishReason, LLMProvider};
use crate::agent::types::AgentConfig;
use crate::error::ClusterError;
use crate::message::{Message, Role, ToolCallLink};
use crate::tools::{DoneTool, ToolCall, ToolContext, ToolOutput, ToolRegistry, DONE_TOOL_NAME};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReActStep {
    pub step_num: usize,
    pub thought: Option<String>,
    pub tool_calls: Vec<ToolCallLink>,
    pub tool_results: Vec<ToolOutput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub answer: String,
    pub steps: Vec<ReActStep>,
    pub success: bool,
    pub error: Option<String>,
    pub cost_tokens: usize,
}

/// The narrow contract a cluster node's executor must satisfy.
#[async_trait]
pub trait Agent: Send + Sync {
    async fn run(&self, input: &str) -> Result<AgentResponse, ClusterError>;
}

pub struct ReActAgent {
    config: AgentConfig,
    provider: Arc<dyn LLMProvider>,
    tools: Arc<ToolRegistry>,
    tool_context: ToolContext,
}

impl ReActAgent {
    /// `tools` is cloned and the `done` tool registered into the copy —
    /// every agent gets one regardless of what the caller passed in.
    pub fn new(config: AgentConfig, provider: Arc<dyn LLMProvider>, tools: Arc<ToolRegistry>) -> Self {
        let mut registry = (*tools).clone();
        registry.register(Arc::new(DoneTool));
        Self { config, provider, tools: Arc::new(registry), tool_context: ToolContext::default() }
    }

    pub fn with_tool_context(mut self, ctx: ToolContext) -> Self {
        self.tool_context = ctx;
        self
    }

    /// Drop older assistant+tool message pairs for any tool declared
    /// ephemeral-N, keeping only its most recent N results. Pure transcript
    /// compression, not a correctness mechanism.
    fn trim_ephemeral(&self, messages: Vec<Message>) -> Vec<Message> {
        use std::collections::HashMap;
        let mut occurrences: HashMap<String, Vec<String>> = HashMap::new();
        for m in &messages {
            if matches!(m.role, Role::Tool) {
                if let Some(link) = &m.tool_call {
                    occurrences.entry(link.tool_name.clone()).or_default().push(link.id.clone());
                }
            }
        }

        let mut drop_ids: HashSet<String> = HashSet::new();
        for (tool_name, ids) in occurrences {
            if let Some(tool) = self.tools.get_tool(&tool_name) {
                if let Some(retain) = tool.ephemeral_retain() {
                    if ids.len() > retain {
                        let drop_count = ids.len() - retain;
                        drop_ids.extend(ids[..drop_count].iter().cloned());
                    }
                }
            }
        }

        messages
            .into_iter()
            .filter(|m| match &m.tool_call {
                Some(link) => !drop_ids.contains(&link.id),
                None => true,
            })
            .collect()
    }
}

#[async_trait]
impl Agent for ReActAgent {
    async fn run(&self, input: &str) -> Result<AgentResponse, ClusterError> {
        let mut messages = vec![Message::system(self.config.system_prompt.clone()), Message::user(input)];
        let mut steps = Vec::new();
        let mut cost_tokens = 0usize;
        let definitions = self.tools.definitions();

        for step_num in 0..self.config.max_steps {
            let trimmed = self.trim_ephemeral(messages.clone());
            let params = CompletionParams {
                messages: trimmed,
                tools: definitions.clone(),
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
                stop: None,
            };

            let result = self.provider.complete(params).await?;
            cost_tokens += result.usage.prompt_tokens + result.usage.completion_tokens;

            if result.tool_calls.is_empty() || result.finish_reason != FinishReason::ToolCalls {
                steps.push(ReActStep {
                    step_num,
                    thought: Some(result.content.clone()),
                    tool_calls: vec![],
                    tool_results: vec![],
                });

                if self.config.require_done_tool {
                    // A plain-text answer doesn't satisfy the guardrail; nudge
                    // the model to call `done` and keep looping.
                    messages.push(Message { role: Role::Assistant, content: result.content, tool_call: None });
                    messages.push(Message::user(format!(
                        "Call the `{DONE_TOOL_NAME}` tool with your final result to finish; a plain-text answer is not accepted."
                    )));
                    continue;
                }

                return Ok(AgentResponse {
                    answer: result.content,
                    steps,
                    success: true,
                    error: None,
                    cost_tokens,
                });
            }

            messages.push(Message {
                role: Role::Assistant,
                content: result.content.clone(),
                tool_call: result.tool_calls.first().cloned(),
            });

            let calls: Vec<ToolCall> = result
                .tool_calls
                .iter()
                .map(|link| ToolCall {
                    id: link.id.clone(),
                    name: link.tool_name.clone(),
                    arguments: link.arguments.clone().unwrap_or(serde_json::Value::Null),
                })
                .collect();

            let outputs = self.tools.execute_parallel(&calls, &self.tool_context).await;
            let mut tool_results = Vec::new();
            let mut done_answer = None;
            for (call, output) in calls.iter().zip(outputs.into_iter()) {
                let output = match output {
                    Ok(o) => o,
                    Err(e) => return Err(e),
                };
                let link = ToolCallLink { id: call.id.clone(), tool_name: call.name.clone(), arguments: None };
                messages.push(Message::tool_result(
                    serde_json::to_string(&output.content).unwrap_or_default(),
                    link,
                ));
                if call.name == DONE_TOOL_NAME && output.success {
                    let answer = output.content.as_str().map(str::to_string).unwrap_or_else(|| output.content.to_string());
                    done_answer.get_or_insert(answer);
                }
                tool_results.push(output);
            }

            steps.push(ReActStep {
                step_num,
                thought: Some(result.content),
                tool_calls: result.tool_calls,
                tool_results,
            });

            if let Some(answer) = done_answer {
                return Ok(AgentResponse { answer, steps, success: true, error: None, cost_tokens });
            }
        }

        Err(ClusterError::AgentMaxSteps { max_steps: self.config.max_steps })
    }
}
