//! # TRC Simulation
//!
//! Software stand-ins for the hardware the control core talks to, and a
//! demo routine that exercises the whole core against them.
//!
//! # Module Structure
//!
//! - [`drivers`] - Simulated accelerometer, sonar and I2C register port
//! - [`demo`] - Demo `RobotMode` and the rig that wires it to the core
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────── CycleRunner ─────────────────────────────┐
//! │  PreContinuous: TimerManager, Accelerometer (integration), I2cDevice   │
//! │  run_periodic:  DemoMode state machine                                 │
//! └───────┬──────────────────────┬──────────────────────────┬──────────────┘
//!         ▼                      ▼                          ▼
//!   SimAccelerometer         SimSonar                  SimI2cPort
//!   (AxisSource)             (ScalarSource)            (I2cPort)
//! ```

pub mod demo;
pub mod drivers;
