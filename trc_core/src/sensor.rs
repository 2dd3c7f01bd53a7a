//! Sensor integration and filtering pipeline.
//!
//! ```text
//! source sample ─► sign·(raw − zero offset) ─► deadband ─► [Kalman] ─► value
//!                                                                       │
//!                                                      [Integrator] ◄───┘
//!                                                      velocity, distance
//! ```
//!
//! Raw data comes from an [`AxisSource`] (three-axis devices such as the
//! accelerometer) or a [`ScalarSource`] (analog inputs such as a sonar).
//! Capabilities a source lacks are reported as
//! [`SensorError::Unsupported`](crate::error::SensorError::Unsupported), never
//! as a zero value.

pub mod accelerometer;
pub mod analog;
pub mod calibration;
pub mod data;
pub mod integrator;
pub mod kalman;

use std::fmt;
use std::time::Duration;

use crate::config::CoreConfig;

pub use accelerometer::{AccelOptions, Accelerometer};
pub use analog::AnalogInput;
pub use calibration::{
    AxisCalibration, CalibrationProfile, apply_deadband, calibrate_axes, calibrate_scalar,
};
pub use data::{AxisData, AxisSource, ScalarSource, SensorData};
pub use integrator::Integrator;
pub use kalman::{KalmanFilter, SensorFilter};

/// Sensor axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// X axis.
    X,
    /// Y axis.
    Y,
    /// Z axis.
    Z,
}

impl Axis {
    /// All axes in index order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    #[inline]
    pub(crate) const fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        };
        f.write_str(s)
    }
}

/// Sampling parameters shared by every sensor front end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSettings {
    /// A cached sample is reused while younger than this.
    pub stale_time: Duration,
    /// Samples taken by `calibrate`.
    pub calibration_samples: usize,
    /// Spacing between calibration samples.
    pub calibration_interval: Duration,
    /// Kalman process noise (Q).
    pub process_noise: f64,
    /// Kalman measurement noise (R).
    pub measurement_noise: f64,
}

impl SensorSettings {
    /// Settings from the `[sensor]` and `[kalman]` sections.
    pub fn from_config(config: &CoreConfig) -> Self {
        Self {
            stale_time: config.sensor.stale_time(),
            calibration_samples: config.sensor.calibration_samples,
            calibration_interval: config.sensor.calibration_interval(),
            process_noise: config.kalman.process_noise,
            measurement_noise: config.kalman.measurement_noise,
        }
    }

    pub(crate) fn kalman(&self) -> KalmanFilter {
        KalmanFilter::new(self.process_noise, self.measurement_noise)
    }
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self::from_config(&CoreConfig::default())
    }
}
