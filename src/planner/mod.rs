//! Task planner
//!
//! Decompose a task into subtasks, execute the resulting DAG with
//! round-based ready-set concurrency, then synthesize a final answer from
//! the subtask results.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::agent::provider::{CompletionParams, LLMProvider};
use crate::cluster::TaskAd;
use crate::message::Message;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub description: String,
    pub domain: String,
    pub dependencies: HashSet<String>,
    pub estimated_complexity: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub agent_id: String,
    pub content: String,
    pub success: bool,
    pub token_cost: usize,
    pub error_count: u32,
    pub duration_ms: u64,
}

/// Runs a single subtask to completion. The planner is agnostic to how —
/// callers typically wire this back into the adaptive loop for recursive
/// execution.
#[async_trait]
pub trait SubtaskExecutor: Send + Sync {
    async fn execute(&self, subtask: &Subtask) -> TaskResult;
}

const MAX_SUBTASKS: usize = 5;

pub struct Planner {
    provider: Arc<dyn LLMProvider>,
}

impl Planner {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }

    /// Ask the LLM for a JSON array of subtasks, capped at 5. Malformed
    /// output falls back to a single subtask mirroring the input.
    pub async fn decompose(&self, task: &TaskAd) -> Vec<Subtask> {
        let prompt = format!(
            "Decompose this task into at most {MAX_SUBTASKS} subtasks as a JSON array of \
             {{id, description, domain, dependencies, estimated_complexity}}: {}",
            task.description
        );
        let params = CompletionParams {
            messages: vec![Message::user(prompt)],
            tools: vec![],
            max_tokens: 1024,
            temperature: 0.2,
            stop: None,
        };

        let response = match self.provider.complete(params).await {
            Ok(r) => r.content,
            Err(e) => {
                warn!(error = %e, "decompose: llm call failed, falling back to single subtask");
                return vec![Self::fallback_subtask(task)];
            }
        };

        match Self::parse_subtasks(&response) {
            Some(mut subtasks) => {
                subtasks.truncate(MAX_SUBTASKS);
                subtasks
            }
            None => vec![Self::fallback_subtask(task)],
        }
    }

    fn fallback_subtask(task: &TaskAd) -> Subtask {
        Subtask {
            id: task.task_id.clone(),
            description: task.description.clone(),
            domain: task.domain.clone(),
            dependencies: HashSet::new(),
            estimated_complexity: task.estimated_complexity,
        }
    }

    fn parse_subtasks(response: &str) -> Option<Vec<Subtask>> {
        let start = response.find('[')?;
        let end = response.rfind(']')?;
        if end < start {
            return None;
        }
        let json_str = &response[start..=end];
        serde_json::from_str(json_str).ok()
    }

    /// Repeatedly run every subtask whose dependencies are satisfied,
    /// concurrently. If a round finds none ready while subtasks remain,
    /// the remaining subtasks are cyclic: emit one failed result each and
    /// stop.
    pub async fn execute_dag(
        &self,
        subtasks: Vec<Subtask>,
        executor: &(dyn SubtaskExecutor),
    ) -> Vec<TaskResult> {
        let mut remaining = subtasks;
        let mut done: HashSet<String> = HashSet::new();
        let mut results = Vec::new();

        while !remaining.is_empty() {
            let (ready, not_ready): (Vec<Subtask>, Vec<Subtask>) =
                remaining.into_iter().partition(|s| s.dependencies.iter().all(|d| done.contains(d)));

            if ready.is_empty() {
                for stuck in not_ready {
                    warn!(subtask_id = %stuck.id, "cyclic dependency detected, emitting failed result");
                    results.push(TaskResult {
                        task_id: stuck.id,
                        agent_id: String::new(),
                        content: String::new(),
                        success: false,
                        token_cost: 0,
                        error_count: 1,
                        duration_ms: 0,
                    });
                }
                break;
            }

            let futures = ready.iter().map(|s| executor.execute(s));
            let round_results = futures::future::join_all(futures).await;
            for (subtask, result) in ready.iter().zip(round_results.into_iter()) {
                done.insert(subtask.id.clone());
                results.push(result);
            }

            remaining = not_ready;
        }

        results
    }

    /// Ask the LLM to synthesize a final answer from concatenated results.
    pub async fn aggregate(&self, task: &TaskAd, results: &[TaskResult]) -> String {
        let concatenated = results
            .iter()
            .map(|r| format!("[{}] {}", r.task_id, r.content))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Synthesize a final answer to \"{}\" from these subtask results:\n{}",
            task.description, concatenated
        );
        let params = CompletionParams {
            messages: vec![Message::user(prompt)],
            tools: vec![],
            max_tokens: 2048,
            temperature: 0.3,
            stop: None,
        };
        match self.provider.complete(params).await {
            Ok(r) => r.content,
            Err(_) => concatenated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::provider::EchoProvider;

    fn task() -> TaskAd {
        TaskAd {
            task_id: "t1".into(),
            domain: "code".into(),
            description: "build a thing".into(),
            estimated_complexity: 0.8,
            priority: 0.5,
            required_tools: vec![],
            token_budget: 4096,
        }
    }

    struct AlwaysSucceeds;
    #[async_trait]
    impl SubtaskExecutor for AlwaysSucceeds {
        async fn execute(&self, subtask: &Subtask) -> TaskResult {
            TaskResult {
                task_id: subtask.id.clone(),
                agent_id: "a1".into(),
                content: format!("done: {}", subtask.description),
                success: true,
                token_cost: 10,
                error_count: 0,
                duration_ms: 1,
            }
        }
    }

    #[tokio::test]
    async fn malformed_decompose_response_falls_back_to_single_subtask() {
        let planner = Planner::new(Arc::new(EchoProvider));
        let subtasks = planner.decompose(&task()).await;
        assert_eq!(subtasks.len(), 1);
        assert_eq!(subtasks[0].id, "t1");
    }

    #[tokio::test]
    async fn linear_dependencies_complete_in_topological_order() {
        let planner = Planner::new(Arc::new(EchoProvider));
        let mut dep = HashSet::new();
        dep.insert("a".to_string());
        let subtasks = vec![
            Subtask { id: "a".into(), description: "first".into(), domain: "code".into(), dependencies: HashSet::new(), estimated_complexity: 0.2 },
            Subtask { id: "b".into(), description: "second".into(), domain: "code".into(), dependencies: dep, estimated_complexity: 0.2 },
        ];
        let results = planner.execute_dag(subtasks, &AlwaysSucceeds).await;
        let a_pos = results.iter().position(|r| r.task_id == "a").unwrap();
        let b_pos = results.iter().position(|r| r.task_id == "b").unwrap();
        assert!(a_pos < b_pos);
    }

    #[tokio::test]
    async fn cyclic_dependencies_report_one_failed_result_each() {
        let planner = Planner::new(Arc::new(EchoProvider));
        let mut dep_a = HashSet::new();
        dep_a.insert("b".to_string());
        let mut dep_b = HashSet::new();
        dep_b.insert("a".to_string());
        let subtasks = vec![
            Subtask { id: "a".into(), description: "x".into(), domain: "code".into(), dependencies: dep_a, estimated_complexity: 0.2 },
            Subtask { id: "b".into(), description: "y".into(), domain: "code".into(), dependencies: dep_b, estimated_complexity: 0.2 },
        ];
        let results = planner.execute_dag(subtasks, &AlwaysSucceeds).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.success));
    }
}
