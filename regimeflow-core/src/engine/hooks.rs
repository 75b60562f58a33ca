//! Hook manager: prioritized pre/post-dispatch callbacks that can skip or
//! cancel an event (§4.10).
//!
//! Hooks are sorted by priority (lower runs first) and invoked in that
//! order for every event passing through the dispatcher. A hook returning
//! `HookDecision::Skip` stops remaining hooks for that phase but lets the
//! event continue to dispatch; `Cancel` stops the event from dispatching
//! at all. `Continue` lets the next hook run.

use crate::core::types::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookDecision {
    Continue,
    Skip,
    Cancel,
}

pub trait Hook: Send {
    fn on_pre_dispatch(&mut self, _event: &Event) -> HookDecision {
        HookDecision::Continue
    }

    fn on_post_dispatch(&mut self, _event: &Event) {}

    fn priority(&self) -> i32 {
        0
    }
}

struct Entry {
    hook: Box<dyn Hook>,
    priority: i32,
}

#[derive(Default)]
pub struct HookManager {
    entries: Vec<Entry>,
}

impl HookManager {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn register(&mut self, hook: Box<dyn Hook>) {
        let priority = hook.priority();
        self.entries.push(Entry { hook, priority });
        self.entries.sort_by_key(|e| e.priority);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs pre-dispatch hooks in priority order. Returns `false` if the
    /// event should be dropped (any hook returned `Cancel`).
    pub fn run_pre_dispatch(&mut self, event: &Event) -> bool {
        for entry in &mut self.entries {
            match entry.hook.on_pre_dispatch(event) {
                HookDecision::Continue => continue,
                HookDecision::Skip => break,
                HookDecision::Cancel => return false,
            }
        }
        true
    }

    pub fn run_post_dispatch(&mut self, event: &Event) {
        for entry in &mut self.entries {
            entry.hook.on_post_dispatch(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{EventPayload, SystemPayload, Timestamp};

    struct RecordingHook {
        priority: i32,
        log: std::sync::Arc<parking_lot::Mutex<Vec<i32>>>,
        decision: HookDecision,
    }

    impl Hook for RecordingHook {
        fn on_pre_dispatch(&mut self, _event: &Event) -> HookDecision {
            self.log.lock().push(self.priority);
            self.decision
        }
        fn priority(&self) -> i32 {
            self.priority
        }
    }

    fn test_event() -> Event {
        Event::new(Timestamp(0), None, EventPayload::System(SystemPayload::BacktestStart))
    }

    #[test]
    fn runs_in_priority_order() {
        let log = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut mgr = HookManager::new();
        mgr.register(Box::new(RecordingHook { priority: 5, log: log.clone(), decision: HookDecision::Continue }));
        mgr.register(Box::new(RecordingHook { priority: 1, log: log.clone(), decision: HookDecision::Continue }));
        mgr.register(Box::new(RecordingHook { priority: 3, log: log.clone(), decision: HookDecision::Continue }));

        assert!(mgr.run_pre_dispatch(&test_event()));
        assert_eq!(*log.lock(), vec![1, 3, 5]);
    }

    #[test]
    fn cancel_stops_dispatch_and_later_hooks() {
        let log = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut mgr = HookManager::new();
        mgr.register(Box::new(RecordingHook { priority: 1, log: log.clone(), decision: HookDecision::Cancel }));
        mgr.register(Box::new(RecordingHook { priority: 2, log: log.clone(), decision: HookDecision::Continue }));

        assert!(!mgr.run_pre_dispatch(&test_event()));
        assert_eq!(*log.lock(), vec![1]);
    }

    #[test]
    fn skip_stops_later_hooks_but_dispatch_continues() {
        let log = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut mgr = HookManager::new();
        mgr.register(Box::new(RecordingHook { priority: 1, log: log.clone(), decision: HookDecision::Skip }));
        mgr.register(Box::new(RecordingHook { priority: 2, log: log.clone(), decision: HookDecision::Continue }));

        assert!(mgr.run_pre_dispatch(&test_event()));
        assert_eq!(*log.lock(), vec![1]);
    }
}
