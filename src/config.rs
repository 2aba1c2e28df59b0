//! Configuration structs
//!
//! A recognized-options bag per component, each with a `Default` carrying
//! the documented defaults. `ClusterConfig::from_env` demonstrates the
//! `dotenv`-backed override pattern used by the demo binary; the core never
//! requires env vars to be present.

use std::env;

/// Bid weights used by [`crate::cluster::ClusterManager::compute_bid`].
#[derive(Debug, Clone, Copy)]
pub struct BidWeights {
    pub capability: f64,
    pub availability: f64,
    pub history: f64,
    pub tools: f64,
}

impl Default for BidWeights {
    fn default() -> Self {
        Self {
            capability: 0.4,
            availability: 0.25,
            history: 0.2,
            tools: 0.15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackStrategy {
    BestAvailable,
    None,
}

#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub min_nodes: usize,
    pub max_nodes: usize,
    pub max_depth: u32,
    pub mitosis_threshold: f64,
    pub apoptosis_threshold: f64,
    pub consecutive_loss_limit: u32,
    pub idle_timeout_secs: i64,
    pub bid_weights: BidWeights,
    pub min_bids: usize,
    pub fallback_strategy: FallbackStrategy,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            min_nodes: 1,
            max_nodes: 64,
            max_depth: 3,
            mitosis_threshold: 0.6,
            apoptosis_threshold: 0.4,
            consecutive_loss_limit: 6,
            idle_timeout_secs: 600,
            bid_weights: BidWeights::default(),
            min_bids: 1,
            fallback_strategy: FallbackStrategy::BestAvailable,
        }
    }
}

impl ClusterConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = env::var("CLUSTER_MAX_DEPTH") {
            if let Ok(parsed) = v.parse() {
                cfg.max_depth = parsed;
            }
        }
        if let Ok(v) = env::var("CLUSTER_MITOSIS_THRESHOLD") {
            if let Ok(parsed) = v.parse() {
                cfg.mitosis_threshold = parsed;
            }
        }
        cfg
    }
}

#[derive(Debug, Clone)]
pub struct RewardConfig {
    pub alpha: f64,
    pub decay_rate: f64,
    pub judge_interval: Option<u32>,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            alpha: 0.3,
            decay_rate: 0.01,
            judge_interval: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContextConfig {
    pub context_window: usize,
    pub output_reserve_ratio: f64,
    pub adaptive_alpha: f64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            context_window: 8192,
            output_reserve_ratio: 0.25,
            adaptive_alpha: 0.3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MemoryConfig {
    pub l1_token_budget: usize,
    pub l2_token_budget: usize,
    pub l3_token_budget: usize,
    pub l1_to_l2_base_importance: f32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            l1_token_budget: 2048,
            l2_token_budget: 4096,
            l3_token_budget: 16384,
            l1_to_l2_base_importance: 0.3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub complexity_llm_threshold_chars: usize,
    pub evolution_reward_threshold: f64,
    pub evolution_window: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            complexity_llm_threshold_chars: 200,
            evolution_reward_threshold: 0.35,
            evolution_window: 5,
        }
    }
}

/// Top-level bag handed to the adaptive loop at construction time.
#[derive(Debug, Clone, Default)]
pub struct CoreConfig {
    pub cluster: ClusterConfig,
    pub reward: RewardConfig,
    pub context: ContextConfig,
    pub memory: MemoryConfig,
    pub loop_: LoopConfig,
}
