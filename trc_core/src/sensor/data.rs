//! Timestamped samples and the raw-data source capabilities.

use std::time::Duration;

use super::Axis;
use crate::error::SensorError;

/// Timestamped scalar sample.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorData {
    /// Time of acquisition on the control clock.
    pub timestamp: Duration,
    /// Sample value.
    pub value: f64,
}

impl SensorData {
    /// New sample.
    pub const fn new(timestamp: Duration, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Timestamped three-axis sample.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisData {
    /// Time of acquisition on the control clock.
    pub timestamp: Duration,
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl AxisData {
    /// New sample.
    pub const fn new(timestamp: Duration, x: f64, y: f64, z: f64) -> Self {
        Self { timestamp, x, y, z }
    }

    /// Component for `axis`.
    #[inline]
    pub fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Component for `axis` as a scalar sample.
    #[inline]
    pub fn sample(&self, axis: Axis) -> SensorData {
        SensorData::new(self.timestamp, self.get(axis))
    }
}

/// Three-axis raw-data source (accelerometer, gyro).
pub trait AxisSource: Send {
    /// Acquire one sample.
    fn read_axes(&mut self) -> Result<AxisData, SensorError>;
}

/// Scalar raw-data source (analog input, sonar, encoder).
///
/// Only `read_raw` is mandatory. Sources that cannot provide integrated
/// data keep the defaults, which report `SensorError::Unsupported`.
pub trait ScalarSource: Send {
    /// Acquire one sample.
    fn read_raw(&mut self) -> Result<SensorData, SensorError>;

    /// Hardware-integrated value (e.g. velocity from an acceleration source).
    fn read_raw_integrated(&mut self) -> Result<SensorData, SensorError> {
        Err(SensorError::Unsupported("integrated data"))
    }

    /// Hardware double-integrated value.
    fn read_raw_double_integrated(&mut self) -> Result<SensorData, SensorError> {
        Err(SensorError::Unsupported("double-integrated data"))
    }
}

impl<T: AxisSource + ?Sized> AxisSource for Box<T> {
    fn read_axes(&mut self) -> Result<AxisData, SensorError> {
        (**self).read_axes()
    }
}

impl<T: ScalarSource + ?Sized> ScalarSource for Box<T> {
    fn read_raw(&mut self) -> Result<SensorData, SensorError> {
        (**self).read_raw()
    }

    fn read_raw_integrated(&mut self) -> Result<SensorData, SensorError> {
        (**self).read_raw_integrated()
    }

    fn read_raw_double_integrated(&mut self) -> Result<SensorData, SensorError> {
        (**self).read_raw_double_integrated()
    }
}
