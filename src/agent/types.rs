//! Agent configuration
//!
//! No fixed "kind" enum: a node's capability profile decides its behavior,
//! not a hardcoded agent type tag. `AgentConfig` only carries the knobs the
//! tool-use loop itself needs.

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub model: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub allowed_tools: Vec<String>,
    /// Hard stop: emits `agent-max-steps` once reached.
    pub max_steps: usize,
    /// The agent must call a built-in `done(result)` tool to finish.
    pub require_done_tool: bool,
    /// Soft cap, separate from `max_steps`, used by callers that want to
    /// nudge the model toward wrapping up before the hard stop.
    pub max_iterations: usize,
    pub provider_url: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "default".to_string(),
            system_prompt: String::new(),
            temperature: 0.7,
            max_tokens: 4096,
            allowed_tools: Vec::new(),
            max_steps: 10,
            require_done_tool: false,
            max_iterations: 8,
            provider_url: None,
        }
    }
}
