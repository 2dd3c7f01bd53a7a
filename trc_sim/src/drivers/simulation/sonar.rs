//! Simulated ultrasonic range finder.

use trc_core::clock::SharedClock;
use trc_core::error::SensorError;
use trc_core::sensor::{ScalarSource, SensorData};

/// Sonar closing on a wall at constant speed.
///
/// Distance starts at `start_cm` and shrinks by `closing_cm_per_s` until it
/// reaches zero. Only raw readings are available; the integrated reads keep
/// their unsupported defaults.
pub struct SimSonar {
    clock: SharedClock,
    start_cm: f64,
    closing_cm_per_s: f64,
}

impl SimSonar {
    /// Create a sonar.
    pub fn new(clock: SharedClock, start_cm: f64, closing_cm_per_s: f64) -> Self {
        Self {
            clock,
            start_cm,
            closing_cm_per_s,
        }
    }
}

impl ScalarSource for SimSonar {
    fn read_raw(&mut self) -> Result<SensorData, SensorError> {
        let now = self.clock.now();
        let d = (self.start_cm - self.closing_cm_per_s * now.as_secs_f64()).max(0.0);
        Ok(SensorData::new(now, d))
    }
}
