//! Skill catalog — tier 2 of the match phase
//!
//! A catalog of agent skills that aren't backed by a live node yet. Before
//! spawning a fresh generalist node, the match phase scans this catalog
//! for a narrowly-specialized skill whose trigger keywords fit the task;
//! a hit is loaded into the cluster as a new node seeded with that
//! skill's capability scores, and retired from the catalog so it isn't
//! matched twice.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct SkillDescriptor {
    pub name: String,
    pub keywords: Vec<String>,
    pub tools: Vec<String>,
    pub priority: f32,
}

#[derive(Debug, Clone)]
pub struct SkillMatch {
    pub skill: SkillDescriptor,
    pub score: f32,
    pub matched_keywords: Vec<String>,
}

/// Narrow lookup interface over a skill catalog, consistent with the
/// one-method-per-role trait convention used for
/// `LLMProvider`/`Tool`/`KnowledgeRetriever`.
#[async_trait]
pub trait SkillCatalog: Send + Sync {
    async fn find_match(&self, input: &str) -> Option<SkillMatch>;
    fn mark_loaded(&self, name: &str);
}

/// In-memory catalog with keyword-overlap scoring:
/// `score = priority * (matched_keywords / total_keywords)`, skipped below
/// `min_score` and for any skill already loaded.
pub struct InMemorySkillCatalog {
    catalog: Vec<SkillDescriptor>,
    loaded: Mutex<HashSet<String>>,
    min_score: f32,
}

impl InMemorySkillCatalog {
    pub fn new(catalog: Vec<SkillDescriptor>) -> Self {
        Self { catalog, loaded: Mutex::new(HashSet::new()), min_score: 0.3 }
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }
}

#[async_trait]
impl SkillCatalog for InMemorySkillCatalog {
    async fn find_match(&self, input: &str) -> Option<SkillMatch> {
        let lower = input.to_lowercase();
        let loaded = self.loaded.lock().unwrap();
        let mut best: Option<SkillMatch> = None;

        for skill in &self.catalog {
            if loaded.contains(&skill.name) || skill.keywords.is_empty() {
                continue;
            }
            let matched: Vec<String> =
                skill.keywords.iter().filter(|k| lower.contains(k.to_lowercase().as_str())).cloned().collect();
            if matched.is_empty() {
                continue;
            }
            let score = skill.priority * (matched.len() as f32 / skill.keywords.len() as f32);
            if score < self.min_score {
                continue;
            }
            if best.as_ref().map(|b| score > b.score).unwrap_or(true) {
                best = Some(SkillMatch { skill: skill.clone(), score, matched_keywords: matched });
            }
        }

        best
    }

    fn mark_loaded(&self, name: &str) {
        self.loaded.lock().unwrap().insert(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skill(name: &str, keywords: &[&str], priority: f32) -> SkillDescriptor {
        SkillDescriptor {
            name: name.into(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            tools: vec![],
            priority,
        }
    }

    #[tokio::test]
    async fn matches_on_keyword_overlap_above_min_score() {
        let catalog = InMemorySkillCatalog::new(vec![skill("sql-expert", &["sql", "query", "database"], 0.9)]);
        let result = catalog.find_match("please write a sql query for me").await;
        assert!(result.is_some());
        let m = result.unwrap();
        assert_eq!(m.skill.name, "sql-expert");
        assert!(m.score >= 0.3);
    }

    #[tokio::test]
    async fn below_min_score_is_skipped() {
        let catalog = InMemorySkillCatalog::new(vec![skill("rare-fit", &["alpha", "beta", "gamma", "delta"], 0.5)]);
        // Only one of four keywords hits: 0.5 * (1/4) = 0.125 < default 0.3.
        let result = catalog.find_match("mention alpha only").await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn loaded_skills_are_not_matched_again() {
        let catalog = InMemorySkillCatalog::new(vec![skill("sql-expert", &["sql"], 0.9)]);
        catalog.mark_loaded("sql-expert");
        let result = catalog.find_match("sql sql sql").await;
        assert!(result.is_none());
    }
}
