//! Self-organizing agent cluster core
//!
//! A multi-agent execution engine built around a six-phase adaptive loop —
//! sense, match, scale, execute, evaluate, adapt — layered over a cluster of
//! agent nodes that bid for work, split under load, and merge back together
//! when they go quiet.

pub mod agent;
pub mod cluster;
pub mod config;
pub mod context;
pub mod error;
pub mod event_bus;
pub mod knowledge;
pub mod lifecycle;
pub mod loop_engine;
pub mod memory;
pub mod message;
pub mod planner;
pub mod reward;
pub mod token;
pub mod tools;

pub use agent::{Agent, AgentResponse, MockAgent, ReActAgent};
pub use cluster::{AgentNode, ClusterManager};
pub use config::CoreConfig;
pub use error::{ClusterError, ClusterResult};
pub use event_bus::EventBus;
pub use loop_engine::{demo_loop, AdaptiveLoop, LoopEvent};
pub use memory::MemoryManager;
pub use reward::RewardBus;
