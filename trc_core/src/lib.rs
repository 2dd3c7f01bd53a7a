//! # TRC Core
//!
//! Platform-independent real-time control core for a competition robot.
//! Every higher-level behavior is built from four interlocking pieces:
//!
//! 1. **Scheduler**: [`task::TaskManager`] multiplexes subsystem updates into
//!    six ordered phases; [`cycle::CycleRunner`] drives those phases each
//!    control cycle.
//! 2. **Synchronization**: [`event::Event`], one-shot [`timer::Timer`]s and
//!    the event-gated [`state::StateMachine`] sequence multi-step behaviors
//!    without blocking.
//! 3. **Sensor pipeline**: [`sensor`]: zero-offset/deadband correction,
//!    Kalman filtering and integration to velocity and distance.
//! 4. **Async I2C**: [`i2c::I2cDevice`]: queued, non-blocking register
//!    reads and writes serviced by a port command state machine.
//!
//! Actuators are reached through the [`motor::MotorController`] capability.
//!
//! Behaviors are state machines that wait on events; events are signaled by
//! timers, sensor triggers and I2C completions; the single scheduler tick
//! drives all of it forward.
//!
//! # Module Structure
//!
//! - [`clock`] - Injectable monotonic time source
//! - [`config`] - TOML configuration
//! - [`error`] - Error types
//! - [`prelude`] - Common re-exports

pub mod clock;
pub mod config;
pub mod cycle;
pub mod error;
pub mod event;
pub mod i2c;
pub mod motor;
pub mod prelude;
pub mod sensor;
pub mod state;
pub mod task;
pub mod timer;
