//! Event bus
//!
//! Typed pub/sub with pattern matching and parent -> child propagation.
//! The transport primitive (`tokio::sync::broadcast`) and the general
//! shape (a `Sender` wrapped in a struct with `publish`/`subscribe`) carry
//! over from the simpler agency-wide bus this grew out of; what's new here
//! is the dispatch table (exact, wildcard, pattern, parent) and handler
//! isolation required by a per-task-tree bus.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// A closed set of event type names, per component. New variants should be
/// added here rather than inventing ad hoc strings at call sites.
pub mod event_type {
    pub const TEXT_DELTA: &str = "text_delta";
    pub const REASONING_DELTA: &str = "reasoning_delta";
    pub const TOOL_CALL_START: &str = "tool_call_start";
    pub const TOOL_CALL_DELTA: &str = "tool_call_delta";
    pub const TOOL_CALL_END: &str = "tool_call_end";
    pub const STEP_START: &str = "step_start";
    pub const STEP_END: &str = "step_end";
    pub const ERROR: &str = "error";
    pub const DONE: &str = "done";
}

/// A single event flowing through a bus. `event_type` is the dispatch key;
/// `payload` carries whatever component-specific data the emitter wants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterEvent {
    pub event_type: String,
    pub payload: Value,
}

impl ClusterEvent {
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }
}

/// A subscriber callback. Handlers must be re-entrant: the same handler may
/// be invoked multiple times concurrently if the emitter fans out.
pub type Handler = Arc<dyn Fn(&ClusterEvent) + Send + Sync>;

struct Subscriber {
    id: u64,
    handler: Handler,
}

#[derive(Default)]
struct Subscriptions {
    exact: HashMap<String, Vec<Subscriber>>,
    patterns: Vec<(String, Vec<Subscriber>)>,
    wildcard: Vec<Subscriber>,
    next_id: u64,
}

/// Hierarchical event bus. `emit` delivers to this bus's subscribers in the
/// order exact -> wildcard -> pattern, then recurses into the parent bus if
/// one was set via [`EventBus::create_child`].
pub struct EventBus {
    subs: Mutex<Subscriptions>,
    parent: Option<Arc<EventBus>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subs: Mutex::new(Subscriptions::default()),
            parent: None,
        }
    }

    /// Create a child bus whose emissions also propagate to `self`.
    pub fn create_child(self: &Arc<Self>) -> Arc<EventBus> {
        Arc::new(EventBus {
            subs: Mutex::new(Subscriptions::default()),
            parent: Some(self.clone()),
        })
    }

    /// Subscribe to an exact event type. Returns a subscription id usable
    /// with [`EventBus::off`].
    pub fn on(&self, event_type: impl Into<String>, handler: Handler) -> u64 {
        let mut subs = self.subs.lock().unwrap();
        let id = subs.next_id;
        subs.next_id += 1;
        subs.exact
            .entry(event_type.into())
            .or_default()
            .push(Subscriber { id, handler });
        id
    }

    /// Subscribe to a `"prefix:*"` pattern. Matching is prefix-based on the
    /// part before `:*`.
    pub fn on_pattern(&self, pattern: impl Into<String>, handler: Handler) -> u64 {
        let pattern = pattern.into();
        let prefix = pattern.trim_end_matches('*').to_string();
        let mut subs = self.subs.lock().unwrap();
        let id = subs.next_id;
        subs.next_id += 1;
        if let Some((_, list)) = subs.patterns.iter_mut().find(|(p, _)| *p == prefix) {
            list.push(Subscriber { id, handler });
        } else {
            subs.patterns.push((prefix, vec![Subscriber { id, handler }]));
        }
        id
    }

    /// Subscribe to every event emitted on this bus.
    pub fn on_all(&self, handler: Handler) -> u64 {
        let mut subs = self.subs.lock().unwrap();
        let id = subs.next_id;
        subs.next_id += 1;
        subs.wildcard.push(Subscriber { id, handler });
        id
    }

    /// Remove a subscription by id, wherever it was registered.
    pub fn off(&self, id: u64) {
        let mut subs = self.subs.lock().unwrap();
        for list in subs.exact.values_mut() {
            list.retain(|s| s.id != id);
        }
        for (_, list) in subs.patterns.iter_mut() {
            list.retain(|s| s.id != id);
        }
        subs.wildcard.retain(|s| s.id != id);
    }

    /// Deliver `event` to exact-type subscribers, then wildcard, then
    /// matching pattern subscribers, then recurse to the parent bus.
    /// A handler that panics is isolated via `catch_unwind`; the failure is
    /// logged and other handlers still run.
    pub fn emit(&self, event: ClusterEvent) {
        let (exact, wildcard, matching_patterns) = {
            let subs = self.subs.lock().unwrap();
            let exact = subs
                .exact
                .get(&event.event_type)
                .map(|v| v.iter().map(|s| s.handler.clone()).collect::<Vec<_>>())
                .unwrap_or_default();
            let wildcard = subs
                .wildcard
                .iter()
                .map(|s| s.handler.clone())
                .collect::<Vec<_>>();
            let matching_patterns: Vec<Handler> = subs
                .patterns
                .iter()
                .filter(|(prefix, _)| event.event_type.starts_with(prefix.as_str()))
                .flat_map(|(_, list)| list.iter().map(|s| s.handler.clone()))
                .collect();
            (exact, wildcard, matching_patterns)
        };

        for handler in exact.iter().chain(wildcard.iter()).chain(matching_patterns.iter()) {
            Self::dispatch(handler, &event);
        }

        if let Some(parent) = &self.parent {
            parent.emit(event);
        }
    }

    fn dispatch(handler: &Handler, event: &ClusterEvent) {
        let handler = handler.clone();
        let event = event.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            handler(&event);
        }));
        if let Err(_) = result {
            warn!(event_type = %event.event_type, "event bus handler panicked, swallowed");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn exact_then_wildcard_then_pattern_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o = order.clone();
        bus.on(event_type::DONE, Arc::new(move |_| o.lock().unwrap().push("exact")));
        let o = order.clone();
        bus.on_all(Arc::new(move |_| o.lock().unwrap().push("wildcard")));
        let o = order.clone();
        bus.on_pattern("done:*", Arc::new(move |_| o.lock().unwrap().push("pattern")));

        bus.emit(ClusterEvent::new("done:final", Value::Null));
        assert_eq!(*order.lock().unwrap(), vec!["wildcard", "pattern"]);
    }

    #[test]
    fn parent_receives_child_events() {
        let parent = Arc::new(EventBus::new());
        let child = parent.create_child();

        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        parent.on_all(Arc::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        child.emit(ClusterEvent::new(event_type::STEP_START, Value::Null));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn off_removes_subscription() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let id = bus.on(event_type::DONE, Arc::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        bus.off(id);
        bus.emit(ClusterEvent::new(event_type::DONE, Value::Null));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicking_handler_does_not_stop_others() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.on(event_type::ERROR, Arc::new(|_| panic!("boom")));
        let c = count.clone();
        bus.on(event_type::ERROR, Arc::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        bus.emit(ClusterEvent::new(event_type::ERROR, Value::Null));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
