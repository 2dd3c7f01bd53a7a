//! Wait set: the events a state machine is blocked on.

use crate::event::Event;

/// How the wait set decides it is satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitMode {
    /// Every event must be signaled.
    #[default]
    All,
    /// Any single signaled event suffices.
    Any,
}

/// Ordered set of awaited events (no duplicates).
#[derive(Debug, Clone, Default)]
pub struct WaitSet {
    events: Vec<Event>,
    mode: WaitMode,
}

impl WaitSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `event` unless the same event is already present.
    pub fn add(&mut self, event: &Event) {
        if !self.events.iter().any(|e| e.same_as(event)) {
            self.events.push(event.clone());
        }
    }

    /// Set the satisfaction rule.
    #[inline]
    pub fn set_mode(&mut self, mode: WaitMode) {
        self.mode = mode;
    }

    /// Drop every event.
    #[inline]
    pub fn clear(&mut self) {
        self.events.clear();
        self.mode = WaitMode::All;
    }

    /// Clear every awaited event, then empty the set.
    ///
    /// Called when a wait completes so a reused event does not satisfy the
    /// next wait immediately.
    pub fn consume(&mut self) {
        for event in &self.events {
            event.clear();
        }
        self.clear();
    }

    /// Number of awaited events.
    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether nothing is awaited.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Whether the wait is over. An empty set is always satisfied.
    pub fn is_satisfied(&self) -> bool {
        if self.events.is_empty() {
            return true;
        }
        match self.mode {
            WaitMode::All => self.events.iter().all(Event::is_signaled),
            WaitMode::Any => self.events.iter().any(Event::is_signaled),
        }
    }
}
