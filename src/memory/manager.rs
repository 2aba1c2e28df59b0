//! Memory manager
//!
//! Composes L1 -> L2 -> L3 as a cascade: L1 evictions are promoted into L2
//! at a configurable base importance; L2 evictions are promoted into L3.
//! Shape (a config struct with `Default`, a manager owning the backing
//! stores, `#[cfg(test)]` coverage) follows the resource-manager pattern
//! this grew out of; the RAM-monitoring content of that manager is
//! replaced entirely with tiered promotion.

use crate::config::MemoryConfig;
use crate::memory::entry::MemoryEntry;
use crate::memory::l1::SlidingWindow;
use crate::memory::l2::WorkingMemory;
use crate::memory::l3::LongTermStore;
use crate::message::Message;

pub struct MemoryManager {
    config: MemoryConfig,
    l1: SlidingWindow,
    l2: WorkingMemory,
    l3: LongTermStore,
}

impl MemoryManager {
    pub fn new(config: MemoryConfig) -> Self {
        let l1 = SlidingWindow::new(config.l1_token_budget);
        let l2 = WorkingMemory::new(config.l2_token_budget);
        let l3 = LongTermStore::new();
        Self { config, l1, l2, l3 }
    }

    /// Add a message to L1; any eviction cascades into L2, then L3.
    pub fn add_message(&mut self, msg: Message) {
        let evicted_from_l1 = self.l1.add(msg);
        for msg in evicted_from_l1 {
            let entry = MemoryEntry::new(msg.content)
                .with_importance(self.config.l1_to_l2_base_importance);
            self.promote_to_l2(entry);
        }
    }

    fn promote_to_l2(&mut self, entry: MemoryEntry) {
        let evicted_from_l2 = self.l2.store(entry);
        for entry in evicted_from_l2 {
            self.l3.store(entry);
        }
    }

    /// Gather L2 + L3 entries relevant to `query`, sorted by importance
    /// descending, filled greedily under `budget`.
    pub fn extract_for(&self, query: &str, budget: usize) -> Vec<MemoryEntry> {
        let mut candidates: Vec<MemoryEntry> = self.l2.entries().to_vec();
        candidates.extend(self.l3.retrieve(query, 50).into_iter().cloned());
        candidates.sort_by(|a, b| b.importance.partial_cmp(&a.importance).unwrap());

        let mut selected = Vec::new();
        let mut used = 0;
        for entry in candidates {
            if used + entry.tokens > budget {
                continue;
            }
            used += entry.tokens;
            selected.push(entry);
        }
        selected
    }

    /// Reserve room for recent L1 messages as a verbatim transcript, then
    /// fill the remainder with `extract_for`.
    pub fn build_context(&self, query: &str, budget: usize) -> (Vec<Message>, Vec<MemoryEntry>) {
        let transcript_budget = budget / 2;
        let mut used = 0;
        let mut recent = Vec::new();
        for msg in self.l1.messages().collect::<Vec<_>>().into_iter().rev() {
            let tokens = crate::token::estimate_tokens(&msg.content);
            if used + tokens > transcript_budget {
                break;
            }
            used += tokens;
            recent.push(msg.clone());
        }
        recent.reverse();

        let remaining_budget = budget.saturating_sub(used);
        let extracted = self.extract_for(query, remaining_budget);
        (recent, extracted)
    }

    /// Write external entries into L2 with importance bumped by `boost`
    /// (capped at 1.0). Used for parent -> child context seeding.
    pub fn absorb(&mut self, entries: Vec<MemoryEntry>, boost: f32) {
        for mut entry in entries {
            entry.importance = (entry.importance + boost).min(1.0);
            self.promote_to_l2(entry);
        }
    }

    pub fn l1_len(&self) -> usize {
        self.l1.len()
    }

    pub fn l2_len(&self) -> usize {
        self.l2.len()
    }

    pub fn l3_len(&self) -> usize {
        self.l3.len()
    }

    pub fn l2_entries(&self) -> &[MemoryEntry] {
        self.l2.entries()
    }
}
