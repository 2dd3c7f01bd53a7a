//! State machine module root.
//!
//! Generic event-gated state machine plus its wait set.

pub mod machine;
pub mod wait;

pub use machine::{Flow, StateMachine};
pub use wait::{WaitMode, WaitSet};
