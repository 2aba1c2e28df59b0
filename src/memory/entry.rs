//! Memory entry
//!
//! A single unit of the memory hierarchy. Owned by exactly one layer at a
//! time; promotion between layers transfers ownership and recomputes the
//! token count rather than trusting the value from the prior layer.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::token::estimate_tokens;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub content: String,
    pub tokens: usize,
    pub importance: f32,
    pub metadata: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl MemoryEntry {
    /// Create a new entry, computing its token count from `content`.
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        let tokens = estimate_tokens(&content);
        Self {
            id: Uuid::new_v4().to_string(),
            content,
            tokens,
            importance: 0.5,
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_importance(mut self, importance: f32) -> Self {
        self.importance = importance.clamp(0.0, 1.0);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Recompute `tokens` from `content`. Called whenever an entry crosses
    /// a layer boundary so a stale count from the prior layer is never
    /// trusted.
    pub fn recompute_tokens(&mut self) {
        self.tokens = estimate_tokens(&self.content);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_computes_tokens() {
        let entry = MemoryEntry::new("abcdefgh");
        assert_eq!(entry.tokens, 2);
        assert_eq!(entry.importance, 0.5);
    }

    #[test]
    fn importance_is_clamped() {
        let entry = MemoryEntry::new("x").with_importance(1.5);
        assert_eq!(entry.importance, 1.0);
        let entry = MemoryEntry::new("x").with_importance(-1.0);
        assert_eq!(entry.importance, 0.0);
    }
}
