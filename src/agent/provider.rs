//! LLM provider — narrow external interface
//!
//! The core never depends on a concrete backend (OpenAI-compatible,
//! Anthropic, local inference, ...); it only depends on this trait.
//! Retries and circuit-breaking live in the adapter, not here — only
//! terminal failures should surface as [`ClusterError`].

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::ClusterError;
use crate::message::{Message, ToolCallLink};
use crate::tools::ToolDefinition;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionParams {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub max_tokens: usize,
    pub temperature: f32,
    pub stop: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    MaxTokens,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResult {
    pub content: String,
    pub tool_calls: Vec<ToolCallLink>,
    pub usage: Usage,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StreamChunk {
    Text(String),
    Reasoning(String),
    ToolCallDelta { id: String, fragment: String },
    ToolCall(ToolCallLink),
    Finish(FinishReason),
}

/// One method each for the two suspension points a provider offers: a
/// single round-trip, or a stream of incremental chunks.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn complete(&self, params: CompletionParams) -> Result<CompletionResult, ClusterError>;

    async fn stream(&self, params: CompletionParams) -> Result<BoxStream<'static, StreamChunk>, ClusterError>;
}

/// Deterministic provider with no network dependency, used by tests and as
/// the crate's default when no real backend is wired up.
pub struct EchoProvider;

#[async_trait]
impl LLMProvider for EchoProvider {
    async fn complete(&self, params: CompletionParams) -> Result<CompletionResult, ClusterError> {
        let last_user = params
            .messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, crate::message::Role::User))
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(CompletionResult {
            content: format!("echo: {last_user}"),
            tool_calls: Vec::new(),
            usage: Usage { prompt_tokens: crate::token::estimate_tokens(&last_user), completion_tokens: 4 },
            finish_reason: FinishReason::Stop,
        })
    }

    async fn stream(&self, params: CompletionParams) -> Result<BoxStream<'static, StreamChunk>, ClusterError> {
        let result = self.complete(params).await?;
        let chunks = vec![StreamChunk::Text(result.content), StreamChunk::Finish(result.finish_reason)];
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_provider_echoes_last_user_message() {
        let provider = EchoProvider;
        let params = CompletionParams {
            messages: vec![Message::user("hello")],
            tools: vec![],
            max_tokens: 100,
            temperature: 0.0,
            stop: None,
        };
        let result = provider.complete(params).await.unwrap();
        assert_eq!(result.content, "echo: hello");
        assert_eq!(result.finish_reason, FinishReason::Stop);
    }
}
