//! Lifecycle manager
//!
//! Node birth (mitosis), merging, and death (apoptosis), plus the health
//! classifier that decides which action applies.

use std::sync::Arc;

use chrono::Utc;

use crate::agent::Agent;
use crate::cluster::{AgentNode, CapabilityProfile, ClusterManager, NodeStatus, TaskAd};
use crate::config::{ClusterConfig, MemoryConfig};
use crate::error::ClusterError;
use crate::memory::MemoryManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Warning,
    Dying,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    Keep,
    Merge,
    Recycle,
}

#[derive(Debug, Clone)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub avg_recent_reward: f64,
    pub idle_seconds: i64,
    pub recommendation: Recommendation,
}

pub struct LifecycleManager {
    config: ClusterConfig,
}

impl LifecycleManager {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    /// `true` iff the task is complex enough and the parent has headroom.
    pub fn should_split(&self, task: &TaskAd, node: &AgentNode) -> bool {
        task.estimated_complexity as f64 > self.config.mitosis_threshold
            && (node.depth as u64) < self.config.max_depth as u64
    }

    /// Create a child node specialized for `task.domain`, inheriting the
    /// parent's tools but starting with a fresh capability baseline.
    pub fn mitosis(
        &self,
        parent: &AgentNode,
        task: &TaskAd,
        child_id: impl Into<String>,
        agent: Arc<dyn Agent>,
    ) -> Result<AgentNode, ClusterError> {
        if parent.depth >= self.config.max_depth {
            return Err(ClusterError::MitosisFailed {
                node_id: parent.id.clone(),
                message: "parent already at max depth".into(),
            });
        }

        let mut child = AgentNode::new(child_id, agent, MemoryManager::new(MemoryConfig::default()));
        child.parent_id = Some(parent.id.clone());
        child.depth = parent.depth + 1;
        let mut scores = std::collections::HashMap::new();
        scores.insert(task.domain.clone(), 0.5);
        child.capabilities = CapabilityProfile {
            scores,
            tools: parent.capabilities.tools.clone(),
            total_tasks: 0,
            success_rate: 0.0,
        };
        Ok(child)
    }

    pub fn check_health(&self, node: &AgentNode) -> HealthReport {
        let recent = node.recent_rewards(10);
        let avg = if recent.is_empty() {
            0.0
        } else {
            recent.iter().map(|r| r.reward).sum::<f64>() / recent.len() as f64
        };

        let idle_seconds = match node.last_active_at {
            Some(ts) => (Utc::now() - ts).num_seconds(),
            None => i64::MAX, // unset timestamp is treated as "long idle"
        };

        let dying = node.consecutive_losses >= self.config.consecutive_loss_limit
            || avg < self.config.apoptosis_threshold
            || idle_seconds > self.config.idle_timeout_secs;
        let warning = node.consecutive_losses >= self.config.consecutive_loss_limit / 2;

        let status = if dying {
            HealthStatus::Dying
        } else if warning {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        };

        let recommendation = match status {
            HealthStatus::Healthy => Recommendation::Keep,
            HealthStatus::Warning => Recommendation::Merge,
            HealthStatus::Dying if !recent.is_empty() => Recommendation::Merge,
            HealthStatus::Dying => Recommendation::Recycle,
        };

        HealthReport { status, avg_recent_reward: avg, idle_seconds, recommendation }
    }

    /// Score each idle peer by capability complementarity, discounted by
    /// load; the highest-scoring peer wins.
    pub fn find_merge_target(&self, dying: &AgentNode, cluster: &ClusterManager) -> Option<String> {
        let mut best: Option<(String, f64)> = None;
        for id in cluster.idle_peer_ids(&dying.id) {
            let candidate = cluster.get_node(&id)?;
            let mut complementarity = 0.0;
            let domains: std::collections::HashSet<&String> = dying
                .capabilities
                .scores
                .keys()
                .chain(candidate.capabilities.scores.keys())
                .collect();
            for d in domains {
                let a = dying.capabilities.capability(d) as f64;
                let b = candidate.capabilities.capability(d) as f64;
                complementarity += (a - b).abs();
            }
            let score = complementarity * (1.0 - 0.5 * candidate.load as f64);
            if best.as_ref().map(|(_, s)| score > *s).unwrap_or(true) {
                best = Some((id, score));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Fold `src`'s capabilities into `tgt`, weighted by each profile's
    /// task count, and union their tool sets.
    pub fn merge_capabilities(src: &CapabilityProfile, tgt: &mut CapabilityProfile) {
        let sw = src.total_tasks as f64;
        let tw = tgt.total_tasks as f64;
        let total = (sw + tw).max(1.0);

        let domains: std::collections::HashSet<String> =
            src.scores.keys().chain(tgt.scores.keys()).cloned().collect();
        for domain in domains {
            let s = *src.scores.get(&domain).unwrap_or(&0.0) as f64;
            let t = *tgt.scores.get(&domain).unwrap_or(&0.0) as f64;
            let merged = (t * tw / total + s * sw / total).clamp(0.0, 1.0);
            tgt.scores.insert(domain, merged as f32);
        }
        tgt.tools.extend(src.tools.iter().cloned());
    }

    /// Reject if the cluster is at `min_nodes` or the node is busy;
    /// otherwise find a merge target, fold capabilities into it, and
    /// remove the dying node.
    pub fn apoptosis(
        &self,
        node_id: &str,
        cluster: &mut ClusterManager,
    ) -> Result<Option<String>, ClusterError> {
        if cluster.len() <= self.config.min_nodes {
            return Err(ClusterError::ApoptosisRejected {
                node_id: node_id.to_string(),
                reason: "cluster at min_nodes".into(),
            });
        }
        let status = cluster
            .get_node(node_id)
            .map(|n| n.status)
            .ok_or_else(|| ClusterError::ApoptosisRejected {
                node_id: node_id.to_string(),
                reason: "node not found".into(),
            })?;
        if status == NodeStatus::Busy {
            return Err(ClusterError::ApoptosisRejected {
                node_id: node_id.to_string(),
                reason: "node is busy".into(),
            });
        }

        let dying_node = cluster.get_node(node_id).unwrap();
        let target_id = self.find_merge_target(dying_node, cluster);

        if let Some(target_id) = &target_id {
            let src_profile = cluster.get_node(node_id).unwrap().capabilities.clone();
            if let Some(target) = cluster.get_node_mut(target_id) {
                Self::merge_capabilities(&src_profile, &mut target.capabilities);
            }
        }
        cluster.remove_node(node_id);
        Ok(target_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::MockAgent;
    use std::sync::Arc as StdArc;

    fn node_at(depth: u32) -> AgentNode {
        let mut n = AgentNode::new(
            format!("n{depth}"),
            StdArc::new(MockAgent::default()),
            MemoryManager::new(MemoryConfig::default()),
        );
        n.depth = depth;
        n
    }

    fn task_with_complexity(c: f32) -> TaskAd {
        TaskAd {
            task_id: "t".into(),
            domain: "code".into(),
            description: "x".into(),
            estimated_complexity: c,
            priority: 0.5,
            required_tools: vec![],
            token_budget: 1000,
        }
    }

    #[test]
    fn mitosis_threshold_scenarios() {
        let lifecycle = LifecycleManager::new(ClusterConfig::default());
        assert!(lifecycle.should_split(&task_with_complexity(0.8), &node_at(1)));
        assert!(!lifecycle.should_split(&task_with_complexity(0.3), &node_at(1)));
        assert!(!lifecycle.should_split(&task_with_complexity(0.8), &node_at(3)));
    }

    #[test]
    fn merge_capabilities_stays_in_bounds_and_unions_tools() {
        let mut src = CapabilityProfile::new();
        src.scores.insert("code".into(), 0.9);
        src.tools.insert("grep".into());
        src.total_tasks = 10;

        let mut tgt = CapabilityProfile::new();
        tgt.scores.insert("code".into(), 0.3);
        tgt.tools.insert("ls".into());
        tgt.total_tasks = 5;

        LifecycleManager::merge_capabilities(&src, &mut tgt);
        let score = tgt.capability("code");
        assert!(score >= 0.0 && score <= 1.0);
        assert!(tgt.tools.contains("grep"));
        assert!(tgt.tools.contains("ls"));
    }

    #[test]
    fn apoptosis_rejected_at_min_nodes() {
        let mut cluster = ClusterManager::new(ClusterConfig { min_nodes: 1, ..ClusterConfig::default() });
        cluster.add_node(node_at(0));
        let lifecycle = LifecycleManager::new(ClusterConfig { min_nodes: 1, ..ClusterConfig::default() });
        let result = lifecycle.apoptosis("n0", &mut cluster);
        assert!(result.is_err());
    }

    #[test]
    fn apoptosis_rejected_when_busy() {
        let mut cluster = ClusterManager::new(ClusterConfig { min_nodes: 1, ..ClusterConfig::default() });
        cluster.add_node(node_at(0));
        let mut busy = node_at(1);
        busy.status = NodeStatus::Busy;
        cluster.add_node(busy);

        let lifecycle = LifecycleManager::new(ClusterConfig { min_nodes: 1, ..ClusterConfig::default() });
        let result = lifecycle.apoptosis("n1", &mut cluster);
        assert!(result.is_err());
    }
}
