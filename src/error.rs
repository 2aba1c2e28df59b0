//! Cluster error taxonomy
//!
//! A closed set of error kinds shared across the adaptive loop and its
//! collaborators, per the propagation policy: terminal LLM/tool failures,
//! auction/mitosis/apoptosis outcomes, and agent guardrail trips all surface
//! through this single enum rather than one type per component.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("llm rate limited, retry after {retry_after_ms}ms")]
    LlmRateLimit { retry_after_ms: u64 },

    #[error("llm authentication failed: {message}")]
    LlmAuth { message: String },

    #[error("llm stream interrupted: {message}")]
    LlmStreamInterrupted {
        message: String,
        partial_content: String,
    },

    #[error("llm circuit open")]
    LlmCircuitOpen,

    #[error("tool '{tool}' timed out")]
    ToolTimeout { tool: String },

    #[error("tool '{tool}' result too large ({size} bytes)")]
    ToolResultTooLarge { tool: String, size: usize },

    #[error("tool '{tool}' validation failed: {message}")]
    ToolValidation { tool: String, message: String },

    #[error("no winner found in auction for task {task_id}")]
    AuctionNoWinner { task_id: String },

    #[error("mitosis failed for node {node_id}: {message}")]
    MitosisFailed { node_id: String, message: String },

    #[error("apoptosis rejected for node {node_id}: {reason}")]
    ApoptosisRejected { node_id: String, reason: String },

    #[error("agent aborted: {message}")]
    AgentAbort { message: String },

    #[error("agent hit max steps ({max_steps})")]
    AgentMaxSteps { max_steps: usize },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ClusterResult<T> = Result<T, ClusterError>;
