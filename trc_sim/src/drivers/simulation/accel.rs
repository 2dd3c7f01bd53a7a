//! Simulated three-axis accelerometer.

use parking_lot::Mutex;
use std::sync::Arc;

use trc_core::clock::SharedClock;
use trc_core::error::SensorError;
use trc_core::sensor::{AxisData, AxisSource};

/// Repeating noise pattern, scaled by the configured amplitude.
const NOISE_PATTERN: [f64; 4] = [1.0, -1.0, 0.5, -0.5];

/// Shared handle used to command the simulated acceleration.
#[derive(Debug, Clone, Default)]
pub struct AccelCommand(Arc<Mutex<[f64; 3]>>);

impl AccelCommand {
    /// Set the true acceleration on every axis [m/s²].
    pub fn set(&self, x: f64, y: f64, z: f64) {
        *self.0.lock() = [x, y, z];
    }

    /// Current commanded acceleration.
    pub fn get(&self) -> [f64; 3] {
        *self.0.lock()
    }
}

/// Accelerometer reading `bias + command + noise` on each axis.
///
/// The noise follows a fixed pattern, so two runs on the same clock produce
/// identical samples.
pub struct SimAccelerometer {
    clock: SharedClock,
    bias: [f64; 3],
    noise: f64,
    command: AccelCommand,
    samples: usize,
}

impl SimAccelerometer {
    /// Create a sensor with per-axis `bias` and noise amplitude `noise`.
    pub fn new(clock: SharedClock, bias: [f64; 3], noise: f64) -> Self {
        Self {
            clock,
            bias,
            noise,
            command: AccelCommand::default(),
            samples: 0,
        }
    }

    /// Handle for commanding the true acceleration.
    pub fn command(&self) -> AccelCommand {
        self.command.clone()
    }
}

impl AxisSource for SimAccelerometer {
    fn read_axes(&mut self) -> Result<AxisData, SensorError> {
        let n = self.noise * NOISE_PATTERN[self.samples % NOISE_PATTERN.len()];
        self.samples += 1;
        let cmd = self.command.get();
        Ok(AxisData::new(
            self.clock.now(),
            self.bias[0] + cmd[0] + n,
            self.bias[1] + cmd[1] + n,
            self.bias[2] + cmd[2] + n,
        ))
    }
}
