//! Agent node and capability profile
//!
//! A node owns its agent and its own memory hierarchy; the parent/child
//! link is a weak, lookup-only back-reference (no ownership cycle).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::agent::Agent;
use crate::memory::MemoryManager;
use crate::reward::RewardRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Idle,
    Busy,
    Splitting,
    Dying,
}

#[derive(Debug, Clone, Default)]
pub struct CapabilityProfile {
    pub scores: HashMap<String, f32>,
    pub tools: std::collections::HashSet<String>,
    pub total_tasks: u64,
    pub success_rate: f32,
}

impl CapabilityProfile {
    pub fn new() -> Self {
        Self {
            scores: HashMap::new(),
            tools: std::collections::HashSet::new(),
            total_tasks: 0,
            success_rate: 0.0,
        }
    }

    pub fn capability(&self, domain: &str) -> f32 {
        *self.scores.get(domain).unwrap_or(&0.5)
    }
}

pub struct AgentNode {
    pub id: String,
    pub parent_id: Option<String>,
    pub depth: u32,
    pub capabilities: CapabilityProfile,
    pub status: NodeStatus,
    pub load: f32,
    pub reward_history: Vec<RewardRecord>,
    pub last_active_at: Option<DateTime<Utc>>,
    pub consecutive_losses: u32,
    pub agent: Arc<dyn Agent>,
    pub memory: MemoryManager,
}

impl AgentNode {
    pub fn new(id: impl Into<String>, agent: Arc<dyn Agent>, memory: MemoryManager) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            depth: 0,
            capabilities: CapabilityProfile::new(),
            status: NodeStatus::Idle,
            load: 0.0,
            reward_history: Vec::new(),
            last_active_at: None,
            consecutive_losses: 0,
            agent,
            memory,
        }
    }

    pub fn recent_rewards(&self, n: usize) -> &[RewardRecord] {
        let start = self.reward_history.len().saturating_sub(n);
        &self.reward_history[start..]
    }
}
