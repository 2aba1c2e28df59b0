//! Agent module
//!
//! A ReAct-style tool-use loop wraps a single LLM session; a node's
//! capability profile, not a fixed "agent type", decides what it's good at.

pub mod provider;
pub mod react;
pub mod types;

pub use provider::{CompletionParams, CompletionResult, EchoProvider, LLMProvider, StreamChunk};
pub use react::{Agent, AgentResponse, ReActAgent, ReActStep};
pub use types::AgentConfig;

use async_trait::async_trait;

use crate::error::ClusterError;

/// Deterministic stand-in used wherever a test needs *an* agent without
/// caring about its behavior (cluster/reward/lifecycle fixtures).
#[derive(Default)]
pub struct MockAgent;

#[async_trait]
impl Agent for MockAgent {
    async fn run(&self, input: &str) -> Result<AgentResponse, ClusterError> {
        Ok(AgentResponse {
            answer: format!("mock: {input}"),
            steps: Vec::new(),
            success: true,
            error: None,
            cost_tokens: crate::token::estimate_tokens(input),
        })
    }
}
