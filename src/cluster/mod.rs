//! Cluster manager
//!
//! Owns the node registry and runs the weighted-bid auction that decides
//! which node executes a task.

pub mod node;
pub mod skill;

pub use node::{AgentNode, CapabilityProfile, NodeStatus};
pub use skill::{InMemorySkillCatalog, SkillCatalog, SkillDescriptor, SkillMatch};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::{BidWeights, ClusterConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAd {
    pub task_id: String,
    pub domain: String,
    pub description: String,
    pub estimated_complexity: f32,
    pub priority: f32,
    pub required_tools: Vec<String>,
    pub token_budget: usize,
}

#[derive(Debug, Clone)]
pub struct Bid {
    pub node_id: String,
    pub score: f64,
    pub idle: bool,
}

/// The node registry. No two nodes share an id.
pub struct ClusterManager {
    config: ClusterConfig,
    nodes: HashMap<String, AgentNode>,
}

impl ClusterManager {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config, nodes: HashMap::new() }
    }

    pub fn add_node(&mut self, node: AgentNode) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn remove_node(&mut self, id: &str) -> Option<AgentNode> {
        self.nodes.remove(id)
    }

    pub fn get_node(&self, id: &str) -> Option<&AgentNode> {
        self.nodes.get(id)
    }

    pub fn get_node_mut(&mut self, id: &str) -> Option<&mut AgentNode> {
        self.nodes.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &String> {
        self.nodes.keys()
    }

    pub fn idle_peer_ids(&self, exclude: &str) -> Vec<String> {
        self.nodes
            .values()
            .filter(|n| n.id != exclude && n.status == NodeStatus::Idle)
            .map(|n| n.id.clone())
            .collect()
    }

    /// Weighted sum over capability, availability, history, and tool-fit.
    pub fn compute_bid(node: &AgentNode, task: &TaskAd, weights: &BidWeights) -> f64 {
        let capability = node.capabilities.capability(&task.domain) as f64;
        let availability = 1.0 - node.load as f64;
        let history = node.capabilities.success_rate as f64;
        let required = task.required_tools.len().max(1);
        let overlap = if task.required_tools.is_empty() {
            1.0
        } else {
            let hit = task
                .required_tools
                .iter()
                .filter(|t| node.capabilities.tools.contains(*t))
                .count();
            hit as f64 / required as f64
        };

        weights.capability * capability
            + weights.availability * availability
            + weights.history * history
            + weights.tools * overlap
    }

    /// Bid from every node whose status is idle or busy.
    pub fn collect_bids(&self, task: &TaskAd) -> Vec<Bid> {
        self.nodes
            .values()
            .filter(|n| matches!(n.status, NodeStatus::Idle | NodeStatus::Busy))
            .map(|n| Bid {
                node_id: n.id.clone(),
                score: Self::compute_bid(n, task, &self.config.bid_weights),
                idle: n.status == NodeStatus::Idle,
            })
            .collect()
    }

    /// Sort bids by score descending; prefer any idle node over any busy
    /// node among the top scorers. `None` only when the bid list is empty
    /// or below `min_bids`.
    pub fn select_winner(&self, task: &TaskAd) -> Option<String> {
        let mut bids = self.collect_bids(task);
        if bids.len() < self.config.min_bids {
            return None;
        }
        bids.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());

        if let Some(idle_winner) = bids.iter().find(|b| b.idle) {
            return Some(idle_winner.node_id.clone());
        }
        bids.first().map(|b| b.node_id.clone())
    }
}

/// A cluster shared across concurrently-executing phases of the adaptive
/// loop, including its own recursive calls (mitosis fans a task out to
/// subtasks that each run their own sense/match/execute cycle).
pub type SharedCluster = Arc<Mutex<ClusterManager>>;

/// RAII guard ensuring a node is never left `busy` after a phase returns,
/// even on early return, error, or cancellation — the async counterpart to
/// a plain `&mut AgentNode` guard, which can't work here because the node
/// lives behind a [`SharedCluster`] lock that recursive mitosis execution
/// needs to re-acquire. Holds a cloned handle back to the cluster instead
/// of the node itself, and restores idle status from a detached task on
/// `Drop` so a future that gets dropped or cancelled mid-execution still
/// releases its node.
pub struct ClusterBusyGuard {
    cluster: SharedCluster,
    node_id: String,
}

impl ClusterBusyGuard {
    pub async fn enter(cluster: SharedCluster, node_id: impl Into<String>) -> Self {
        let node_id = node_id.into();
        {
            let mut guard = cluster.lock().await;
            if let Some(node) = guard.get_node_mut(&node_id) {
                node.status = NodeStatus::Busy;
                node.load = 0.8;
                node.last_active_at = Some(Utc::now());
            }
        }
        Self { cluster, node_id }
    }
}

impl Drop for ClusterBusyGuard {
    fn drop(&mut self) {
        let cluster = self.cluster.clone();
        let node_id = std::mem::take(&mut self.node_id);
        tokio::spawn(async move {
            let mut guard = cluster.lock().await;
            if let Some(node) = guard.get_node_mut(&node_id) {
                node.status = NodeStatus::Idle;
                node.load = 0.0;
            }
        });
    }
}
