//! Three-axis accelerometer front end with optional filtering and
//! integration to velocity and distance.
//!
//! The accelerometer owns an [`AxisSource`]. Samples are cached and reused
//! while younger than the staleness threshold, so the three axes read in one
//! control cycle come from the same acquisition. Each fresh sample is
//! corrected (zero offset, sign, deadband), optionally Kalman filtered, and
//! stored; readers only see corrected values.
//!
//! Integration runs as a [`Task`] in the pre-continuous phase while the
//! accelerometer is enabled.

use bitflags::bitflags;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info};

use super::calibration::{AxisCalibration, CalibrationProfile, calibrate_axes};
use super::data::{AxisData, AxisSource, SensorData};
use super::integrator::Integrator;
use super::kalman::{KalmanFilter, SensorFilter};
use super::{Axis, SensorSettings};
use crate::clock::SharedClock;
use crate::error::{SensorError, TaskError};
use crate::task::{PhaseSet, RunMode, Task, TaskHandle, TaskManager};

bitflags! {
    /// Accelerometer construction options.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccelOptions: u8 {
        /// Integrate the X axis.
        const INTEGRATE_X = 1 << 0;
        /// Integrate the Y axis.
        const INTEGRATE_Y = 1 << 1;
        /// Integrate the Z axis.
        const INTEGRATE_Z = 1 << 2;
        /// Kalman filter every axis.
        const FILTER      = 1 << 3;
    }
}

impl AccelOptions {
    fn integrates(self, axis: Axis) -> bool {
        match axis {
            Axis::X => self.contains(Self::INTEGRATE_X),
            Axis::Y => self.contains(Self::INTEGRATE_Y),
            Axis::Z => self.contains(Self::INTEGRATE_Z),
        }
    }
}

#[derive(Debug)]
struct AxisChannel {
    sign: f64,
    calibration: AxisCalibration,
    filter: Option<KalmanFilter>,
    integrator: Option<Integrator>,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    raw: AxisData,
    corrected: [f64; 3],
}

struct Inner<S> {
    source: S,
    axes: [AxisChannel; 3],
    cache: Option<Sample>,
}

impl<S: AxisSource> Inner<S> {
    /// Current sample, acquiring a new one when the cache is stale.
    fn refresh(
        &mut self,
        clock: &SharedClock,
        settings: &SensorSettings,
    ) -> Result<Sample, SensorError> {
        if let Some(sample) = self.cache {
            let age = clock.now().saturating_sub(sample.raw.timestamp);
            if age < settings.stale_time {
                return Ok(sample);
            }
        }

        let raw = self.source.read_axes()?;
        let mut corrected = [0.0; 3];
        for axis in Axis::ALL {
            let ch = &mut self.axes[axis.index()];
            let mut value = ch.calibration.correct(raw.get(axis), ch.sign);
            if let Some(filter) = ch.filter.as_mut() {
                value = filter.filter(value);
            }
            corrected[axis.index()] = value;
        }
        let sample = Sample { raw, corrected };
        self.cache = Some(sample);
        Ok(sample)
    }

    fn integrator(&mut self, axis: Axis) -> Result<&mut Integrator, SensorError> {
        self.axes[axis.index()]
            .integrator
            .as_mut()
            .ok_or(SensorError::NotIntegrated(axis))
    }
}

/// Accelerometer with per-axis calibration, filtering and integration.
///
/// Created with [`Accelerometer::new`], which returns a shared handle: the
/// accelerometer registers that same handle with the task manager when
/// integration is enabled.
pub struct Accelerometer<S> {
    name: String,
    options: AccelOptions,
    settings: SensorSettings,
    clock: SharedClock,
    tasks: TaskManager,
    inner: Mutex<Inner<S>>,
    calibrating: AtomicBool,
    enabled: AtomicBool,
    this: Weak<Self>,
}

impl<S: AxisSource + 'static> Accelerometer<S> {
    /// Create an accelerometer reading from `source`.
    pub fn new(
        name: impl Into<String>,
        source: S,
        options: AccelOptions,
        settings: SensorSettings,
        clock: SharedClock,
        tasks: TaskManager,
    ) -> Arc<Self> {
        let filtered = options.contains(AccelOptions::FILTER);
        let axes = Axis::ALL.map(|axis| AxisChannel {
            sign: 1.0,
            calibration: AxisCalibration::default(),
            filter: filtered.then(|| settings.kalman()),
            integrator: options.integrates(axis).then(Integrator::new),
        });

        Arc::new_cyclic(|this| Self {
            name: name.into(),
            options,
            settings,
            clock,
            tasks,
            inner: Mutex::new(Inner {
                source,
                axes,
                cache: None,
            }),
            calibrating: AtomicBool::new(false),
            enabled: AtomicBool::new(false),
            this: this.clone(),
        })
    }

    /// Instance name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Construction options.
    pub fn options(&self) -> AccelOptions {
        self.options
    }

    /// Invert the sign of `axis`.
    pub fn set_inverted(&self, axis: Axis, inverted: bool) {
        let mut inner = self.inner.lock();
        inner.axes[axis.index()].sign = if inverted { -1.0 } else { 1.0 };
        inner.cache = None;
    }

    /// Calibrate every axis against the stationary sensor.
    ///
    /// Blocks for `calibration_samples × calibration_interval`. Filters and
    /// the sample cache are reset afterwards; integrators are not touched and
    /// should be disabled while calibrating.
    pub fn calibrate(&self) -> Result<CalibrationProfile, SensorError> {
        self.calibrating.store(true, Ordering::SeqCst);
        let mut inner = self.inner.lock();
        let result = calibrate_axes(
            &mut inner.source,
            self.settings.calibration_samples,
            self.settings.calibration_interval,
        );
        if let Ok(profile) = &result {
            for axis in Axis::ALL {
                let ch = &mut inner.axes[axis.index()];
                ch.calibration = profile.axis(axis);
                if let Some(filter) = ch.filter.as_mut() {
                    filter.reset();
                }
            }
            inner.cache = None;
            info!(accel = %self.name, ?profile, "accelerometer calibrated");
        }
        drop(inner);
        self.calibrating.store(false, Ordering::SeqCst);
        result
    }

    /// Whether a calibration run is in progress.
    pub fn is_calibrating(&self) -> bool {
        self.calibrating.load(Ordering::SeqCst)
    }

    /// Current calibration.
    pub fn calibration(&self) -> CalibrationProfile {
        let inner = self.inner.lock();
        CalibrationProfile {
            x: inner.axes[0].calibration,
            y: inner.axes[1].calibration,
            z: inner.axes[2].calibration,
        }
    }

    /// Corrected (and filtered, if enabled) acceleration on `axis`.
    pub fn acceleration(&self, axis: Axis) -> Result<SensorData, SensorError> {
        let sample = self.inner.lock().refresh(&self.clock, &self.settings)?;
        Ok(SensorData::new(sample.raw.timestamp, sample.corrected[axis.index()]))
    }

    /// Uncalibrated, unfiltered acceleration on `axis` with the axis sign
    /// applied.
    pub fn raw_acceleration(&self, axis: Axis) -> Result<SensorData, SensorError> {
        let mut inner = self.inner.lock();
        let sample = inner.refresh(&self.clock, &self.settings)?;
        let sign = inner.axes[axis.index()].sign;
        Ok(SensorData::new(sample.raw.timestamp, sign * sample.raw.get(axis)))
    }

    /// Integrated velocity on `axis`.
    ///
    /// # Errors
    /// `SensorError::NotIntegrated` if the axis was not built with integration.
    pub fn velocity(&self, axis: Axis) -> Result<f64, SensorError> {
        Ok(self.inner.lock().integrator(axis)?.velocity())
    }

    /// Integrated distance on `axis`.
    ///
    /// # Errors
    /// `SensorError::NotIntegrated` if the axis was not built with integration.
    pub fn distance(&self, axis: Axis) -> Result<f64, SensorError> {
        Ok(self.inner.lock().integrator(axis)?.position())
    }

    /// Zero the velocity and distance of `axis`.
    pub fn reset_integrator(&self, axis: Axis) -> Result<(), SensorError> {
        self.inner.lock().integrator(axis)?.reset();
        Ok(())
    }

    /// Whether integration is running.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Start or stop integration.
    ///
    /// Enabling resets every integrator and registers the accelerometer for
    /// the pre-continuous phase. Without integrated axes this is a no-op.
    pub fn set_enabled(&self, enabled: bool) {
        let integrated =
            AccelOptions::INTEGRATE_X | AccelOptions::INTEGRATE_Y | AccelOptions::INTEGRATE_Z;
        if !self.options.intersects(integrated) {
            return;
        }
        let Some(this) = self.this.upgrade() else {
            return;
        };
        let handle: TaskHandle = this;

        if enabled {
            {
                let mut inner = self.inner.lock();
                for ch in inner.axes.iter_mut() {
                    if let Some(integrator) = ch.integrator.as_mut() {
                        integrator.reset();
                    }
                }
            }
            self.tasks.register_task(handle, PhaseSet::PRE_CONTINUOUS);
        } else {
            self.tasks.unregister_task(&handle, PhaseSet::PRE_CONTINUOUS);
        }
        self.enabled.store(enabled, Ordering::SeqCst);
        debug!(accel = %self.name, enabled, "integration toggled");
    }

    /// Feed the current corrected sample to every integrator.
    fn integrate(&self) -> Result<(), SensorError> {
        let mut inner = self.inner.lock();
        let sample = inner.refresh(&self.clock, &self.settings)?;
        for axis in Axis::ALL {
            if let Some(integrator) = inner.axes[axis.index()].integrator.as_mut() {
                integrator.update(SensorData::new(
                    sample.raw.timestamp,
                    sample.corrected[axis.index()],
                ));
            }
        }
        Ok(())
    }
}

impl<S: AxisSource + 'static> Task for Accelerometer<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn pre_continuous_task(&self, _mode: RunMode) -> Result<(), TaskError> {
        self.integrate()?;
        Ok(())
    }
}

impl<S> std::fmt::Debug for Accelerometer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Accelerometer")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("enabled", &self.enabled.load(Ordering::Relaxed))
            .finish()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
