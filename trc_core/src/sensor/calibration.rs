//! Zero-offset and deadband calibration.
//!
//! A calibration run samples a stationary sensor `N` times. The mean becomes
//! the zero offset and the observed spread (max − min) becomes the deadband,
//! so the sensor reads exactly zero while at rest.
//!
//! Calibration blocks for `samples × interval`. Integrators fed by the
//! sensor should be disabled for the duration; this is not enforced.

use std::thread;
use std::time::Duration;
use tracing::debug;

use super::Axis;
use super::data::{AxisSource, ScalarSource};
use crate::error::SensorError;

/// Calibration of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisCalibration {
    /// Subtracted from every raw sample.
    pub zero_offset: f64,
    /// Corrected values with magnitude at or below this read as zero.
    pub deadband: f64,
}

impl AxisCalibration {
    /// Corrected value: offset removed, sign applied, deadband applied.
    #[inline]
    pub fn correct(&self, raw: f64, sign: f64) -> f64 {
        apply_deadband(sign * (raw - self.zero_offset), self.deadband)
    }
}

/// Per-axis calibration of a three-axis sensor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CalibrationProfile {
    /// X axis.
    pub x: AxisCalibration,
    /// Y axis.
    pub y: AxisCalibration,
    /// Z axis.
    pub z: AxisCalibration,
}

impl CalibrationProfile {
    /// Calibration for `axis`.
    pub fn axis(&self, axis: Axis) -> AxisCalibration {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }
}

/// Zero `value` when `|value| <= band`.
#[inline]
pub fn apply_deadband(value: f64, band: f64) -> f64 {
    if value.abs() <= band { 0.0 } else { value }
}

#[derive(Debug, Clone, Copy)]
struct Accumulator {
    sum: f64,
    min: f64,
    max: f64,
    count: usize,
}

impl Accumulator {
    const fn new() -> Self {
        Self {
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            count: 0,
        }
    }

    fn push(&mut self, value: f64) -> Result<(), SensorError> {
        if !value.is_finite() {
            return Err(SensorError::InvalidCalibration(format!(
                "non-finite sample {value}"
            )));
        }
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.count += 1;
        Ok(())
    }

    fn finish(&self) -> AxisCalibration {
        AxisCalibration {
            zero_offset: self.sum / self.count as f64,
            deadband: self.max - self.min,
        }
    }
}

fn check_samples(samples: usize) -> Result<(), SensorError> {
    if samples == 0 {
        return Err(SensorError::InvalidCalibration(
            "sample count must be > 0".into(),
        ));
    }
    Ok(())
}

#[inline]
fn pause(interval: Duration) {
    if !interval.is_zero() {
        thread::sleep(interval);
    }
}

/// Calibrate every axis of a stationary three-axis source.
///
/// # Errors
/// `SensorError::InvalidCalibration` for a zero sample count or a non-finite
/// sample; source errors are propagated.
pub fn calibrate_axes<S: AxisSource + ?Sized>(
    source: &mut S,
    samples: usize,
    interval: Duration,
) -> Result<CalibrationProfile, SensorError> {
    check_samples(samples)?;
    let mut acc = [Accumulator::new(); 3];
    for i in 0..samples {
        let data = source.read_axes()?;
        for axis in Axis::ALL {
            acc[axis.index()].push(data.get(axis))?;
        }
        if i + 1 < samples {
            pause(interval);
        }
    }

    let profile = CalibrationProfile {
        x: acc[0].finish(),
        y: acc[1].finish(),
        z: acc[2].finish(),
    };
    debug!(samples, ?profile, "axes calibrated");
    Ok(profile)
}

/// Calibrate a stationary scalar source.
///
/// # Errors
/// Same as [`calibrate_axes`].
pub fn calibrate_scalar<S: ScalarSource + ?Sized>(
    source: &mut S,
    samples: usize,
    interval: Duration,
) -> Result<AxisCalibration, SensorError> {
    check_samples(samples)?;
    let mut acc = Accumulator::new();
    for i in 0..samples {
        acc.push(source.read_raw()?.value)?;
        if i + 1 < samples {
            pause(interval);
        }
    }
    let cal = acc.finish();
    debug!(samples, ?cal, "scalar calibrated");
    Ok(cal)
}

// ─── Tests ──────────────────────────────────────────────────────────
