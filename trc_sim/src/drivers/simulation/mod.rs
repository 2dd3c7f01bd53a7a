//! Simulation driver module.
//!
//! Sources, ports and actuators that read the injected clock instead of hardware, so a
//! full control loop runs deterministically on a simulated clock.

mod accel;
mod i2c_port;
mod motor;
mod sonar;

pub use accel::{AccelCommand, SimAccelerometer};
pub use i2c_port::{SimI2cBus, SimI2cPort};
pub use motor::SimMotor;
pub use sonar::SimSonar;
