//! Context orchestrator
//!
//! Assembles a prompt's context within a hard token budget by polling N
//! registered providers, each a narrow one-method trait per the
//! one-method-per-role convention, and adaptively re-weighting how much
//! budget each source gets based on how useful its fragments turned out
//! to be.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ContextConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSource {
    Memory,
    Knowledge,
    Skill,
    Cluster,
    Mitosis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextFragment {
    pub source: ContextSource,
    pub content: String,
    pub tokens: usize,
    pub relevance: f32,
    pub metadata: serde_json::Value,
}

#[async_trait]
pub trait ContextProvider: Send + Sync {
    async fn provide(&self, query: &str, sub_budget: usize) -> anyhow::Result<Vec<ContextFragment>>;
}

pub struct ContextOrchestrator {
    config: ContextConfig,
    providers: Vec<(ContextSource, Arc<dyn ContextProvider>)>,
    scores: HashMap<ContextSource, f32>,
}

impl ContextOrchestrator {
    pub fn new(config: ContextConfig) -> Self {
        Self { config, providers: Vec::new(), scores: HashMap::new() }
    }

    pub fn register(&mut self, source: ContextSource, provider: Arc<dyn ContextProvider>) {
        self.scores.entry(source).or_insert(1.0);
        self.providers.push((source, provider));
    }

    /// Gather fragments from every registered provider under `budget`,
    /// allocating sub-budgets proportionally to each source's running
    /// score, then greedily filling by descending relevance.
    pub async fn gather(&mut self, query: &str, budget: usize) -> Vec<ContextFragment> {
        let total_score: f32 = self.providers.iter().map(|(s, _)| *self.scores.get(s).unwrap_or(&1.0)).sum();

        let calls = self.providers.iter().map(|(source, provider)| {
            let score = *self.scores.get(source).unwrap_or(&1.0);
            let sub_budget = if total_score > 0.0 {
                ((budget as f32) * score / total_score).floor() as usize
            } else {
                0
            };
            let provider = provider.clone();
            let query = query.to_string();
            let source = *source;
            async move {
                let fragments = provider.provide(&query, sub_budget).await.unwrap_or_default();
                (source, fragments)
            }
        });

        let per_source_results = futures::future::join_all(calls).await;

        let mut all_fragments: Vec<ContextFragment> =
            per_source_results.iter().flat_map(|(_, frags)| frags.clone()).collect();
        all_fragments.sort_by(|a, b| b.relevance.partial_cmp(&a.relevance).unwrap());

        let mut selected = Vec::new();
        let mut used = 0usize;
        for frag in all_fragments {
            if used + frag.tokens > budget {
                continue;
            }
            used += frag.tokens;
            selected.push(frag);
        }

        self.update_scores(&per_source_results, &selected);
        selected
    }

    fn update_scores(
        &mut self,
        per_source_results: &[(ContextSource, Vec<ContextFragment>)],
        selected: &[ContextFragment],
    ) {
        let alpha = self.config.adaptive_alpha as f32;
        for (source, _) in per_source_results {
            let selected_for_source: Vec<&ContextFragment> =
                selected.iter().filter(|f| f.source == *source).collect();
            let avg_relevance = if selected_for_source.is_empty() {
                0.0
            } else {
                selected_for_source.iter().map(|f| f.relevance).sum::<f32>() / selected_for_source.len() as f32
            };
            let current = *self.scores.get(source).unwrap_or(&1.0);
            self.scores.insert(*source, (1.0 - alpha) * current + alpha * avg_relevance);
        }
    }
}
