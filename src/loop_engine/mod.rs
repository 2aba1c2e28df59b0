//! Adaptive execution loop
//!
//! The top-level orchestrator. Six phases — sense, match, scale, execute,
//! evaluate, adapt — glue together the cluster manager, reward bus,
//! lifecycle manager, memory hierarchy, and planner. Phases run as a
//! pipeline of awaited stages; subtask fan-out within a phase runs
//! concurrently up to the planner's cap.

pub mod sense;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agent::provider::LLMProvider;
use crate::agent::Agent;
use crate::cluster::{AgentNode, ClusterBusyGuard, ClusterManager, SharedCluster, SkillCatalog, TaskAd};
use crate::config::{CoreConfig, MemoryConfig};
use crate::lifecycle::{LifecycleManager, Recommendation};
use crate::memory::MemoryManager;
use crate::planner::{Planner, SubtaskExecutor, Subtask, TaskResult};
use crate::reward::RewardBus;
use sense::Sensor;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LoopEvent {
    Phase(String),
    Error { kind: String, message: String },
    Done { content: String, success: bool },
}

/// Reward accounting and calibration state, kept behind its own lock so it
/// can be touched independently of the node registry — evaluate/adapt
/// needs both at once, but sense only ever needs this half.
struct RewardState {
    reward_bus: RewardBus,
    calibration_bias: HashMap<String, f64>,
}

/// Constructs a fresh agent for a newly spawned or split-off node. The
/// concrete agent/provider/tool wiring is the caller's concern; the loop
/// only needs "give me something that can run".
pub type AgentFactory = Arc<dyn Fn() -> Arc<dyn Agent> + Send + Sync>;

pub struct AdaptiveLoop {
    cluster: SharedCluster,
    reward: Arc<Mutex<RewardState>>,
    lifecycle: LifecycleManager,
    planner: Planner,
    sensor: Sensor,
    config: CoreConfig,
    agent_factory: AgentFactory,
    skill_catalog: Option<Arc<dyn SkillCatalog>>,
}

impl AdaptiveLoop {
    pub fn new(config: CoreConfig, provider: Arc<dyn LLMProvider>, agent_factory: AgentFactory) -> Self {
        let sensor = Sensor::new(provider.clone(), config.loop_.complexity_llm_threshold_chars);
        let planner = Planner::new(provider);
        let lifecycle = LifecycleManager::new(config.cluster.clone());
        let cluster: SharedCluster = Arc::new(Mutex::new(ClusterManager::new(config.cluster.clone())));
        let reward = Arc::new(Mutex::new(RewardState {
            reward_bus: RewardBus::new(config.reward.clone()),
            calibration_bias: HashMap::new(),
        }));
        Self { cluster, reward, lifecycle, planner, sensor, config, agent_factory, skill_catalog: None }
    }

    /// Registers a catalog of loadable-but-not-yet-live skills for tier 2
    /// of the match phase, scanned before a fresh generalist node is
    /// spawned.
    pub fn with_skill_catalog(mut self, catalog: Arc<dyn SkillCatalog>) -> Self {
        self.skill_catalog = Some(catalog);
        self
    }

    pub async fn add_node(&self, node: AgentNode) {
        self.cluster.lock().await.add_node(node);
    }

    pub async fn node_count(&self) -> usize {
        self.cluster.lock().await.len()
    }

    /// Run the full six-phase loop for one piece of input, returning the
    /// sequence of events it produced.
    pub async fn execute(&self, input: &str) -> Vec<LoopEvent> {
        let mut events = Vec::new();

        // Phase 1 — Sense
        events.push(LoopEvent::Phase("sense".into()));
        let bias = self.reward.lock().await.calibration_bias.clone();
        let task_spec = self.sensor.sense(input, &bias).await;
        let domain = task_spec.domains.first().cloned().unwrap_or_else(|| "general".to_string());
        let task = TaskAd {
            task_id: Uuid::new_v4().to_string(),
            domain,
            description: task_spec.input.clone(),
            estimated_complexity: task_spec.complexity,
            priority: 0.5,
            required_tools: vec![],
            token_budget: task_spec.token_budget,
        };

        // Phase 2 — Match
        events.push(LoopEvent::Phase("match".into()));
        let winner_id = match self.match_task(&task).await {
            Some(id) => id,
            None => {
                events.push(LoopEvent::Error { kind: "auction-no-winner".into(), message: task.task_id.clone() });
                events.push(LoopEvent::Done { content: String::new(), success: false });
                return events;
            }
        };

        // Phase 3 + 4 — Scale and Execute
        events.push(LoopEvent::Phase("execute".into()));
        let result = self.scale_and_execute(&winner_id, &task).await;

        // Phase 5 + 6 — Evaluate and Adapt
        events.push(LoopEvent::Phase("evaluate".into()));
        self.evaluate_and_adapt(&winner_id, &task, &result).await;

        events.push(LoopEvent::Done { content: result.content.clone(), success: result.success });
        events
    }

    async fn match_task(&self, task: &TaskAd) -> Option<String> {
        // Tier 1: auction across already-loaded nodes.
        {
            let cluster = self.cluster.lock().await;
            if let Some(id) = cluster.select_winner(task) {
                return Some(id);
            }
        }

        // Tier 2: scan the catalog of loadable-but-unloaded skills for one
        // whose trigger keywords fit the task, and load it as a new node.
        if let Some(catalog) = &self.skill_catalog {
            if let Some(skill_match) = catalog.find_match(&task.description).await {
                let mut node = AgentNode::new(
                    format!("skill:{}", skill_match.skill.name),
                    (self.agent_factory)(),
                    MemoryManager::new(MemoryConfig::default()),
                );
                node.capabilities.scores.insert(skill_match.skill.name.clone(), 0.7);
                for keyword in &skill_match.skill.keywords {
                    node.capabilities.scores.insert(keyword.clone(), 0.6);
                }
                node.capabilities.tools = skill_match.skill.tools.iter().cloned().collect();
                let id = node.id.clone();
                self.cluster.lock().await.add_node(node);
                catalog.mark_loaded(&skill_match.skill.name);
                return Some(id);
            }
        }

        // Tier 3: LLM-driven specialization — spawn a fresh node scoped to
        // the task's domain.
        let mut node = AgentNode::new(
            format!("spawned-{}", Uuid::new_v4()),
            (self.agent_factory)(),
            MemoryManager::new(MemoryConfig::default()),
        );
        node.capabilities.scores.insert(task.domain.clone(), 0.6);
        let id = node.id.clone();
        {
            let mut cluster = self.cluster.lock().await;
            cluster.add_node(node);
            if cluster.select_winner(task).is_some() {
                return Some(id);
            }
            // Tier 4: fallback to any idle node.
            cluster.idle_peer_ids("").into_iter().next()
        }
    }

    /// Marks the winner busy for the duration of scale+execute via a
    /// cancellation-safe guard: if this future is dropped or cancelled
    /// mid-await, the guard's `Drop` still restores the node to idle.
    async fn scale_and_execute(&self, winner_id: &str, task: &TaskAd) -> TaskResult {
        let _busy = ClusterBusyGuard::enter(self.cluster.clone(), winner_id.to_string()).await;

        let should_split = {
            let cluster = self.cluster.lock().await;
            match cluster.get_node(winner_id) {
                Some(node) => task.estimated_complexity > 0.7 && self.lifecycle.should_split(task, node),
                None => false,
            }
        };

        if should_split {
            self.execute_via_mitosis(winner_id, task).await
        } else {
            self.execute_directly(winner_id, task).await
        }
    }

    async fn execute_directly(&self, winner_id: &str, task: &TaskAd) -> TaskResult {
        let prompt = if task.estimated_complexity >= 0.4 {
            format!(
                "Objective: {}\nOutput format: concise, actionable.\nBoundaries: stay within the task's domain.",
                task.description
            )
        } else {
            task.description.clone()
        };

        let agent = {
            let cluster = self.cluster.lock().await;
            cluster.get_node(winner_id).map(|n| n.agent.clone())
        };

        let Some(agent) = agent else {
            return TaskResult {
                task_id: task.task_id.clone(),
                agent_id: winner_id.to_string(),
                content: String::new(),
                success: false,
                token_cost: 0,
                error_count: 1,
                duration_ms: 0,
            };
        };

        match agent.run(&prompt).await {
            Ok(response) => TaskResult {
                task_id: task.task_id.clone(),
                agent_id: winner_id.to_string(),
                content: response.answer,
                success: response.success,
                token_cost: response.cost_tokens,
                error_count: if response.success { 0 } else { 1 },
                duration_ms: 0,
            },
            Err(e) => {
                warn!(error = %e, "execute: agent run failed");
                TaskResult {
                    task_id: task.task_id.clone(),
                    agent_id: winner_id.to_string(),
                    content: String::new(),
                    success: false,
                    token_cost: 0,
                    error_count: 1,
                    duration_ms: 0,
                }
            }
        }
    }

    async fn execute_via_mitosis(&self, winner_id: &str, task: &TaskAd) -> TaskResult {
        let subtasks = self.planner.decompose(task).await;
        let capped: Vec<Subtask> = subtasks.into_iter().take(4).collect();

        struct RecursiveExecutor<'a> {
            loop_: &'a AdaptiveLoop,
        }

        #[async_trait]
        impl<'a> SubtaskExecutor for RecursiveExecutor<'a> {
            async fn execute(&self, subtask: &Subtask) -> TaskResult {
                let events = self.loop_.execute(&subtask.description).await;
                let (content, success) = events
                    .into_iter()
                    .find_map(|e| match e {
                        LoopEvent::Done { content, success } => Some((content, success)),
                        _ => None,
                    })
                    .unwrap_or_default();
                TaskResult {
                    task_id: subtask.id.clone(),
                    agent_id: String::new(),
                    content,
                    success,
                    token_cost: 0,
                    error_count: if success { 0 } else { 1 },
                    duration_ms: 0,
                }
            }
        }

        let executor = RecursiveExecutor { loop_: self };
        let results = self.planner.execute_dag(capped, &executor).await;
        let content = self.planner.aggregate(task, &results).await;
        let success = results.iter().all(|r| r.success);
        let token_cost = results.iter().map(|r| r.token_cost).sum();
        let error_count = results.iter().map(|r| r.error_count).sum();

        TaskResult {
            task_id: task.task_id.clone(),
            agent_id: winner_id.to_string(),
            content,
            success,
            token_cost,
            error_count,
            duration_ms: 0,
        }
    }

    async fn evaluate_and_adapt(&self, winner_id: &str, task: &TaskAd, result: &TaskResult) {
        let reward = {
            let mut cluster = self.cluster.lock().await;
            let Some(node) = cluster.get_node_mut(winner_id) else { return };
            let mut reward_state = self.reward.lock().await;
            reward_state
                .reward_bus
                .evaluate(node, task, &result.content, result.success, result.token_cost, result.error_count)
                .await
        };

        let health = {
            let cluster = self.cluster.lock().await;
            let Some(node) = cluster.get_node(winner_id) else { return };
            self.lifecycle.check_health(node)
        };

        if health.recommendation == Recommendation::Recycle {
            let mut cluster = self.cluster.lock().await;
            let _ = self.lifecycle.apoptosis(winner_id, &mut cluster);
        } else {
            let mut reward_state = self.reward.lock().await;
            self.adapt_calibration(&mut reward_state, task, result);
        }

        if reward < self.config.loop_.evolution_reward_threshold {
            info!(node_id = winner_id, reward, "below evolution threshold");
        }

        let mut cluster = self.cluster.lock().await;
        if let Some(node) = cluster.get_node_mut(winner_id) {
            let reward_state = self.reward.lock().await;
            reward_state.reward_bus.decay_inactive(node);
        }
    }

    fn adapt_calibration(&self, reward_state: &mut RewardState, task: &TaskAd, result: &TaskResult) {
        let actual = 0.6 * (result.token_cost as f64 / 8192.0).min(1.0)
            + 0.4 * (result.duration_ms as f64 / 30000.0).min(1.0);
        let estimated = task.estimated_complexity as f64;
        let current = *reward_state.calibration_bias.get(&task.domain).unwrap_or(&0.0);
        let updated = 0.3 * (actual - estimated) + 0.7 * current;
        reward_state.calibration_bias.insert(task.domain.clone(), updated);
    }
}

/// Convenience constructor used by the demo binary and tests: a loop
/// wired to the deterministic echo provider and a single mock-agent node.
pub fn demo_loop() -> AdaptiveLoop {
    use crate::agent::{EchoProvider, MockAgent};

    let provider: Arc<dyn LLMProvider> = Arc::new(EchoProvider);
    let factory: AgentFactory = Arc::new(|| Arc::new(MockAgent) as Arc<dyn Agent>);
    AdaptiveLoop::new(CoreConfig::default(), provider, factory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{InMemorySkillCatalog, NodeStatus, SkillDescriptor};
    use crate::config::ClusterConfig;

    #[tokio::test]
    async fn empty_cluster_spawns_a_node_and_still_completes() {
        let loop_ = demo_loop();
        let events = loop_.execute("please write a short story").await;
        assert!(matches!(events.last(), Some(LoopEvent::Done { .. })));
        assert!(loop_.node_count().await >= 1);
    }

    #[tokio::test]
    async fn no_node_never_left_busy_after_execution() {
        let loop_ = demo_loop();
        let node = AgentNode::new(
            "seed",
            Arc::new(crate::agent::MockAgent),
            MemoryManager::new(MemoryConfig::default()),
        );
        loop_.add_node(node).await;

        loop_.execute("hello there").await;

        // Idle restoration runs on a detached task spawned from the busy
        // guard's Drop; give it a turn before asserting.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let cluster = loop_.cluster.lock().await;
        assert!(cluster
            .node_ids()
            .all(|id| cluster.get_node(id).map(|n| n.status != NodeStatus::Busy).unwrap_or(true)));
    }

    #[tokio::test]
    async fn fallback_strategy_none_with_no_nodes_still_spawns() {
        let mut config = CoreConfig::default();
        config.cluster = ClusterConfig { min_nodes: 1, ..ClusterConfig::default() };
        let provider: Arc<dyn LLMProvider> = Arc::new(crate::agent::EchoProvider);
        let factory: AgentFactory = Arc::new(|| Arc::new(crate::agent::MockAgent) as Arc<dyn Agent>);
        let loop_ = AdaptiveLoop::new(config, provider, factory);
        let events = loop_.execute("hi").await;
        assert!(matches!(events.last(), Some(LoopEvent::Done { success: true, .. })));
    }

    #[tokio::test]
    async fn skill_catalog_is_checked_before_spawning_a_generalist_node() {
        let provider: Arc<dyn LLMProvider> = Arc::new(crate::agent::EchoProvider);
        let factory: AgentFactory = Arc::new(|| Arc::new(crate::agent::MockAgent) as Arc<dyn Agent>);
        let catalog = Arc::new(InMemorySkillCatalog::new(vec![SkillDescriptor {
            name: "sql-expert".into(),
            keywords: vec!["sql".into(), "query".into()],
            tools: vec![],
            priority: 0.9,
        }]));
        let loop_ = AdaptiveLoop::new(CoreConfig::default(), provider, factory).with_skill_catalog(catalog);

        let events = loop_.execute("write a sql query against the orders table").await;
        assert!(matches!(events.last(), Some(LoopEvent::Done { success: true, .. })));

        let cluster = loop_.cluster.lock().await;
        assert!(cluster.node_ids().any(|id| id == "skill:sql-expert"));
        let node = cluster.get_node("skill:sql-expert").unwrap();
        assert_eq!(node.capabilities.capability("sql-expert"), 0.7);
        assert_eq!(node.capabilities.capability("sql"), 0.6);
    }
}
