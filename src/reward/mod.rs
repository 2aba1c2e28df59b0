//! Reward bus
//!
//! Composes a scalar reward from (quality, efficiency, reliability) and
//! feeds it back into the winning node's capability score via EMA.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cluster::{AgentNode, TaskAd};
use crate::config::RewardConfig;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RewardSignal {
    pub quality: f64,
    pub efficiency: f64,
    pub reliability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardRecord {
    pub task_id: String,
    pub reward: f64,
    pub domain: String,
    pub token_cost: usize,
    pub timestamp: DateTime<Utc>,
}

/// Injected, optional LLM judge. Off by default; consulted every
/// `judge_interval` evaluations in hybrid mode.
#[async_trait]
pub trait RewardJudge: Send + Sync {
    async fn judge(&self, task: &TaskAd, content: &str) -> anyhow::Result<f64>;
}

pub struct RewardBus {
    config: RewardConfig,
    judge: Option<Arc<dyn RewardJudge>>,
    eval_count: u64,
}

impl RewardBus {
    pub fn new(config: RewardConfig) -> Self {
        Self { config, judge: None, eval_count: 0 }
    }

    pub fn with_judge(mut self, judge: Arc<dyn RewardJudge>) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn compute_signal(task: &TaskAd, success: bool, token_cost: usize, error_count: u32) -> RewardSignal {
        let quality = if success { 0.7 } else { 0.0 };
        let efficiency = (1.0 - token_cost as f64 / task.token_budget.max(1) as f64).max(0.0);
        let reliability = if error_count == 0 { 1.0 } else { 0.0 };
        RewardSignal { quality, efficiency, reliability }
    }

    pub fn compute_reward(signal: RewardSignal) -> f64 {
        0.5 * signal.quality + 0.3 * signal.efficiency + 0.2 * signal.reliability
    }

    /// Compute reward, update the node's capability score and success rate,
    /// append a reward record, and track consecutive losses. Returns the
    /// computed reward.
    pub async fn evaluate(
        &mut self,
        node: &mut AgentNode,
        task: &TaskAd,
        content: &str,
        success: bool,
        token_cost: usize,
        error_count: u32,
    ) -> f64 {
        let signal = Self::compute_signal(task, success, token_cost, error_count);
        let mut reward = Self::compute_reward(signal);

        self.eval_count += 1;
        if let Some(judge) = &self.judge {
            if let Some(interval) = self.config.judge_interval {
                if interval > 0 && self.eval_count % interval as u64 == 0 {
                    if let Ok(judge_reward) = judge.judge(task, content).await {
                        reward += 0.5 * (judge_reward - reward);
                    }
                }
            }
        }

        let alpha = self.config.alpha;
        let current = node.capabilities.capability(&task.domain) as f64;
        let updated = alpha * reward + (1.0 - alpha) * current;
        node.capabilities.scores.insert(task.domain.clone(), updated as f32);

        let hit = if reward > 0.5 { 1.0 } else { 0.0 };
        node.capabilities.success_rate =
            (alpha * hit + (1.0 - alpha) * node.capabilities.success_rate as f64) as f32;
        node.capabilities.total_tasks += 1;

        node.reward_history.push(RewardRecord {
            task_id: task.task_id.clone(),
            reward,
            domain: task.domain.clone(),
            token_cost,
            timestamp: Utc::now(),
        });

        if success {
            node.consecutive_losses = 0;
        } else {
            node.consecutive_losses += 1;
        }

        reward
    }

    /// Decay a node's per-domain scores based on days since the last
    /// reward recorded for that domain.
    pub fn decay_inactive(&self, node: &mut AgentNode) {
        let now = Utc::now();
        for (domain, score) in node.capabilities.scores.iter_mut() {
            let last = node
                .reward_history
                .iter()
                .rev()
                .find(|r| &r.domain == domain)
                .map(|r| r.timestamp);

            let days = match last {
                Some(ts) => (now - ts).num_days().max(0),
                None => 2, // no record at all: treat as stale
            };
            if days > 1 {
                *score *= self.config.decay_rate.powi(days as i32) as f32;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::MockAgent;
    use crate::config::MemoryConfig;
    use crate::memory::MemoryManager;
    use std::sync::Arc as StdArc;

    fn task() -> TaskAd {
        TaskAd {
            task_id: "t1".into(),
            domain: "code".into(),
            description: "x".into(),
            estimated_complexity: 0.5,
            priority: 0.5,
            required_tools: vec![],
            token_budget: 1000,
        }
    }

    fn node() -> AgentNode {
        AgentNode::new(
            "n1",
            StdArc::new(MockAgent::default()),
            MemoryManager::new(MemoryConfig::default()),
        )
    }

    #[test]
    fn reward_math_matches_scenario() {
        let signal = RewardBus::compute_signal(&task(), true, 100, 0);
        assert!((signal.quality - 0.7).abs() < 1e-9);
        assert!((signal.efficiency - 0.9).abs() < 1e-9);
        assert!((signal.reliability - 1.0).abs() < 1e-9);

        let reward = RewardBus::compute_reward(signal);
        assert!((reward - 0.82).abs() < 0.01);
    }

    #[tokio::test]
    async fn repeated_success_converges_into_expected_band() {
        let mut bus = RewardBus::new(RewardConfig::default());
        let mut n = node();
        n.capabilities.scores.insert("code".to_string(), 0.5);
        let t = task();

        for _ in 0..30 {
            bus.evaluate(&mut n, &t, "", true, 100, 0).await;
        }
        let score = n.capabilities.capability("code");
        assert!(score >= 0.75 && score <= 0.90, "score was {score}");
    }

    #[tokio::test]
    async fn repeated_failure_drops_below_threshold() {
        let mut bus = RewardBus::new(RewardConfig::default());
        let mut n = node();
        n.capabilities.scores.insert("code".to_string(), 0.8);
        let t = task();

        for _ in 0..20 {
            bus.evaluate(&mut n, &t, "", false, 100, 1).await;
        }
        let score = n.capabilities.capability("code");
        assert!(score < 0.4, "score was {score}");
    }
}
