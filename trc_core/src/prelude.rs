//! Prelude module for common re-exports.
//!
//! # Usage
//!
//! ```rust
//! use trc_core::prelude::*;
//! ```

// ─── Time & Configuration ───────────────────────────────────────────
pub use crate::clock::{Clock, MonotonicClock, SharedClock, SimClock};
pub use crate::config::{CoreConfig, LogLevel};

// ─── Errors ─────────────────────────────────────────────────────────
pub use crate::error::{
    ConfigError, I2cError, MotorError, SensorError, TaskError, TimerError,
};

// ─── Scheduling ─────────────────────────────────────────────────────
pub use crate::cycle::{CycleRunner, CycleStats, Pacing, RobotMode};
pub use crate::task::{Phase, PhaseSet, RunMode, Task, TaskHandle, TaskManager};

// ─── Synchronization ────────────────────────────────────────────────
pub use crate::event::Event;
pub use crate::state::{Flow, StateMachine};
pub use crate::timer::{Timer, TimerManager};

// ─── Devices ────────────────────────────────────────────────────────
pub use crate::i2c::{I2cDevice, I2cPort, ReadAction, ReadCompletion};
pub use crate::motor::{MotorController, SoftEncoder};
pub use crate::sensor::{
    AccelOptions, Accelerometer, AnalogInput, Axis, AxisData, AxisSource, ScalarSource,
    SensorData, SensorSettings,
};
