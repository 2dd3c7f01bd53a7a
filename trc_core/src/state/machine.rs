//! Event-gated state machine.
//!
//! Behaviors are written as a `match` over their own state enum, executed by
//! the owner's periodic callback. Asynchronous operations are issued in one
//! state, their completion events added to the wait set, and the machine told
//! which state to resume in; the callback then simply re-checks
//! [`StateMachine::is_ready`] on later ticks. Nothing blocks.
//!
//! ## Invariants
//! - Ready iff enabled and the wait set is empty or satisfied.
//! - `state()` is stable until `set_state`, a completed wait, or `start`.
//! - One handler invocation per tick, unless the handler explicitly returns
//!   [`Flow::Recheck`] to run the next state in the same tick.

use std::fmt::Debug;
use tracing::{debug, warn};

use super::wait::{WaitMode, WaitSet};
use crate::event::Event;

/// Upper bound on `Flow::Recheck` chains within one `run_once`.
pub const MAX_RECHECKS: usize = 16;

/// What the state handler wants after running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Done for this tick.
    Yield,
    /// Re-check readiness and run the (new) current state immediately.
    Recheck,
}

/// Generic state machine over a caller-defined state type.
#[derive(Debug, Clone)]
pub struct StateMachine<S> {
    name: String,
    state: Option<S>,
    next_state: Option<S>,
    enabled: bool,
    wait: WaitSet,
}

impl<S: Copy + PartialEq + Debug> StateMachine<S> {
    /// Create a stopped machine.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: None,
            next_state: None,
            enabled: false,
            wait: WaitSet::new(),
        }
    }

    /// Machine name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enable the machine in `initial`, dropping any pending wait.
    pub fn start(&mut self, initial: S) {
        self.wait.clear();
        self.next_state = None;
        self.state = Some(initial);
        self.enabled = true;
        debug!(sm = %self.name, state = ?initial, "state machine started");
    }

    /// Disable the machine and clear the wait set. The last state stays
    /// readable.
    pub fn stop(&mut self) {
        self.wait.clear();
        self.next_state = None;
        self.enabled = false;
        debug!(sm = %self.name, state = ?self.state, "state machine stopped");
    }

    /// Whether the machine is running.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current state (`None` before the first `start`).
    #[inline]
    pub fn state(&self) -> Option<S> {
        self.state
    }

    /// Force an immediate transition, abandoning any pending wait.
    pub fn set_state(&mut self, state: S) {
        self.wait.clear();
        self.next_state = None;
        self.state = Some(state);
    }

    /// Add `event` to the wait set.
    pub fn add_event(&mut self, event: &Event) {
        self.wait.add(event);
    }

    /// Advance to `next` once every awaited event is signaled.
    pub fn wait_for_events(&mut self, next: S) {
        self.wait.set_mode(WaitMode::All);
        self.next_state = Some(next);
    }

    /// Advance to `next` once any awaited event is signaled.
    pub fn wait_for_any_event(&mut self, next: S) {
        self.wait.set_mode(WaitMode::Any);
        self.next_state = Some(next);
    }

    /// Number of events currently awaited.
    #[inline]
    pub fn pending_events(&self) -> usize {
        self.wait.len()
    }

    /// Readiness gate.
    ///
    /// When a pending wait has just been satisfied this performs the deferred
    /// transition to the configured next state, clears the awaited events and
    /// empties the wait set before returning `true`.
    pub fn is_ready(&mut self) -> bool {
        if !self.enabled || !self.wait.is_satisfied() {
            return false;
        }
        if !self.wait.is_empty() {
            self.wait.consume();
        }
        if let Some(next) = self.next_state.take() {
            debug!(sm = %self.name, from = ?self.state, to = ?next, "wait complete");
            self.state = Some(next);
        }
        true
    }

    /// Run the handler for the current state if the machine is ready.
    ///
    /// The handler runs once; returning [`Flow::Recheck`] runs the next
    /// state in the same tick if the machine is still ready. Returns whether
    /// the handler ran at all.
    pub fn run_once<F>(&mut self, mut handler: F) -> bool
    where
        F: FnMut(&mut Self, S) -> Flow,
    {
        let mut ran = false;
        for _ in 0..=MAX_RECHECKS {
            if !self.is_ready() {
                return ran;
            }
            let Some(state) = self.state else {
                return ran;
            };
            ran = true;
            if handler(self, state) == Flow::Yield {
                return ran;
            }
        }
        warn!(sm = %self.name, state = ?self.state, "recheck chain limit reached");
        ran
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
