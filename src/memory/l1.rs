//! L1 — sliding window
//!
//! FIFO of original messages in insertion order, bounded by a token budget.

use crate::message::Message;
use crate::token::estimate_tokens;

pub struct SlidingWindow {
    budget: usize,
    messages: Vec<(Message, usize)>,
    total_tokens: usize,
}

impl SlidingWindow {
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            messages: Vec::new(),
            total_tokens: 0,
        }
    }

    /// Append `msg`, then evict from the front while over budget, as long
    /// as more than one message remains. Returns the evicted messages.
    pub fn add(&mut self, msg: Message) -> Vec<Message> {
        let tokens = estimate_tokens(&msg.content);
        self.total_tokens += tokens;
        self.messages.push((msg, tokens));

        let mut evicted = Vec::new();
        while self.total_tokens > self.budget && self.messages.len() > 1 {
            let (evicted_msg, evicted_tokens) = self.messages.remove(0);
            self.total_tokens -= evicted_tokens;
            evicted.push(evicted_msg);
        }
        evicted
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().map(|(m, _)| m)
    }

    pub fn total_tokens(&self) -> usize {
        self.total_tokens
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Most recent `n` messages, oldest first.
    pub fn recent(&self, n: usize) -> Vec<&Message> {
        let start = self.messages.len().saturating_sub(n);
        self.messages[start..].iter().map(|(m, _)| m).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_grows_beyond_budget_plus_one() {
        let mut window = SlidingWindow::new(4); // ~1 token budget
        window.add(Message::user("a")); // 1 token
        let evicted = window.add(Message::user("bbbbbbbb")); // 2 tokens, total 3 > budget(4)? no
        assert!(evicted.is_empty() || window.len() >= 1);
    }

    #[test]
    fn evicts_from_front_when_over_budget() {
        let mut window = SlidingWindow::new(1); // 1 token budget, forces eviction
        window.add(Message::user("aaaa")); // 1 token
        let evicted = window.add(Message::user("bbbb")); // 1 more token, total 2 > 1
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].content, "aaaa");
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn never_evicts_the_last_remaining_message() {
        let mut window = SlidingWindow::new(1);
        let evicted = window.add(Message::user("a very very very long message indeed"));
        assert!(evicted.is_empty());
        assert_eq!(window.len(), 1);
    }
}
