//! L3 — persistent store
//!
//! Keyword-indexed long-term store. A real implementation could substitute
//! a vector store behind the same two operations.

use std::collections::HashMap;

use crate::memory::entry::MemoryEntry;

pub struct LongTermStore {
    entries: HashMap<String, MemoryEntry>,
    insertion_order: Vec<String>,
}

impl LongTermStore {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            insertion_order: Vec::new(),
        }
    }

    pub fn store(&mut self, mut entry: MemoryEntry) {
        entry.recompute_tokens();
        self.insertion_order.push(entry.id.clone());
        self.entries.insert(entry.id.clone(), entry);
    }

    /// Empty query returns the most recent entries first. A non-empty query
    /// scores each entry by the count of (lowercased) query words present
    /// in its content and returns the top `limit`.
    pub fn retrieve(&self, query: &str, limit: usize) -> Vec<&MemoryEntry> {
        if query.trim().is_empty() {
            return self
                .insertion_order
                .iter()
                .rev()
                .filter_map(|id| self.entries.get(id))
                .take(limit)
                .collect();
        }

        let words: Vec<String> = query.split_whitespace().map(|w| w.to_lowercase()).collect();
        let mut scored: Vec<(&MemoryEntry, usize)> = self
            .entries
            .values()
            .map(|entry| {
                let content_lower = entry.content.to_lowercase();
                let score = words.iter().filter(|w| content_lower.contains(w.as_str())).count();
                (entry, score)
            })
            .filter(|(_, score)| *score > 0)
            .collect();

        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored.into_iter().take(limit).map(|(e, _)| e).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for LongTermStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_returns_most_recent_first() {
        let mut store = LongTermStore::new();
        store.store(MemoryEntry::new("first"));
        store.store(MemoryEntry::new("second"));
        let results = store.retrieve("", 10);
        assert_eq!(results[0].content, "second");
        assert_eq!(results[1].content, "first");
    }

    #[test]
    fn keyword_scoring_ranks_by_overlap() {
        let mut store = LongTermStore::new();
        store.store(MemoryEntry::new("Python programming language"));
        store.store(MemoryEntry::new("Java enterprise framework"));
        store.store(MemoryEntry::new("Python data science tutorial"));

        let results = store.retrieve("Python programming", 10);
        assert!(results[0].content.contains("Python"));
        assert!(!results.iter().take(2).any(|e| e.content.contains("Java")));
    }
}
