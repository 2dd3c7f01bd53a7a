//! Scalar analog input front end (sonar, light, potentiometer).

use std::time::Duration;
use tracing::info;

use super::SensorSettings;
use super::calibration::{AxisCalibration, calibrate_scalar};
use super::data::{ScalarSource, SensorData};
use super::kalman::{KalmanFilter, SensorFilter};
use crate::clock::SharedClock;
use crate::error::SensorError;

/// Calibrated, optionally filtered view over a [`ScalarSource`].
///
/// Integrated reads are forwarded to the source, so a sensor that has no
/// integrated output reports `SensorError::Unsupported`.
pub struct AnalogInput<S> {
    name: String,
    source: S,
    clock: SharedClock,
    settings: SensorSettings,
    sign: f64,
    calibration: AxisCalibration,
    filter: Option<KalmanFilter>,
    cache: Option<(SensorData, f64)>,
}

impl<S: ScalarSource> AnalogInput<S> {
    /// Wrap `source`; `filtered` adds a Kalman stage.
    pub fn new(
        name: impl Into<String>,
        source: S,
        filtered: bool,
        settings: SensorSettings,
        clock: SharedClock,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            clock,
            filter: filtered.then(|| settings.kalman()),
            settings,
            sign: 1.0,
            calibration: AxisCalibration::default(),
            cache: None,
        }
    }

    /// Instance name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invert the sign of every reading.
    pub fn set_inverted(&mut self, inverted: bool) {
        self.sign = if inverted { -1.0 } else { 1.0 };
        self.cache = None;
    }

    /// Use an externally determined calibration. Resets the filter.
    pub fn set_calibration(&mut self, calibration: AxisCalibration) {
        self.calibration = calibration;
        self.cache = None;
        if let Some(filter) = self.filter.as_mut() {
            filter.reset();
        }
    }

    /// Calibrate against the resting sensor. Blocks for
    /// `calibration_samples × calibration_interval`.
    pub fn calibrate(&mut self) -> Result<AxisCalibration, SensorError> {
        let cal = calibrate_scalar(
            &mut self.source,
            self.settings.calibration_samples,
            self.settings.calibration_interval,
        )?;
        self.calibration = cal;
        self.cache = None;
        if let Some(filter) = self.filter.as_mut() {
            filter.reset();
        }
        info!(input = %self.name, ?cal, "analog input calibrated");
        Ok(cal)
    }

    fn refresh(&mut self) -> Result<(SensorData, f64), SensorError> {
        if let Some(entry @ (raw, _)) = self.cache {
            let age: Duration = self.clock.now().saturating_sub(raw.timestamp);
            if age < self.settings.stale_time {
                return Ok(entry);
            }
        }
        let raw = self.source.read_raw()?;
        let mut value = self.calibration.correct(raw.value, self.sign);
        if let Some(filter) = self.filter.as_mut() {
            value = filter.filter(value);
        }
        let entry = (raw, value);
        self.cache = Some(entry);
        Ok(entry)
    }

    /// Corrected (and filtered, if enabled) value.
    pub fn value(&mut self) -> Result<SensorData, SensorError> {
        let (raw, value) = self.refresh()?;
        Ok(SensorData::new(raw.timestamp, value))
    }

    /// Source value with only the sign applied.
    pub fn raw_value(&mut self) -> Result<SensorData, SensorError> {
        let (raw, _) = self.refresh()?;
        Ok(SensorData::new(raw.timestamp, self.sign * raw.value))
    }

    /// First integral as reported by the source.
    pub fn integrated_value(&mut self) -> Result<SensorData, SensorError> {
        let d = self.source.read_raw_integrated()?;
        Ok(SensorData::new(d.timestamp, self.sign * d.value))
    }

    /// Second integral as reported by the source.
    pub fn double_integrated_value(&mut self) -> Result<SensorData, SensorError> {
        let d = self.source.read_raw_double_integrated()?;
        Ok(SensorData::new(d.timestamp, self.sign * d.value))
    }
}

impl<S> std::fmt::Debug for AnalogInput<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalogInput")
            .field("name", &self.name)
            .field("calibration", &self.calibration)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, SimClock};

    struct Level {
        clock: SimClock,
        value: f64,
    }

    impl ScalarSource for Level {
        fn read_raw(&mut self) -> Result<SensorData, SensorError> {
            Ok(SensorData::new(self.clock.now(), self.value))
        }
    }

    struct Odometer;

    impl ScalarSource for Odometer {
        fn read_raw(&mut self) -> Result<SensorData, SensorError> {
            Ok(SensorData::new(Duration::ZERO, 1.0))
        }

        fn read_raw_integrated(&mut self) -> Result<SensorData, SensorError> {
            Ok(SensorData::new(Duration::ZERO, 4.0))
        }
    }

    fn settings() -> SensorSettings {
        SensorSettings {
            calibration_samples: 4,
            calibration_interval: Duration::ZERO,
            ..SensorSettings::default()
        }
    }

    #[test]
    fn unsupported_integration_surfaces_as_error() {
        let clock = SimClock::new();
        let src = Level {
            clock: clock.clone(),
            value: 42.0,
        };
        let mut input = AnalogInput::new("sonar", src, false, settings(), clock.shared());
        assert_eq!(input.value().unwrap().value, 42.0);
        assert!(matches!(
            input.integrated_value(),
            Err(SensorError::Unsupported(_))
        ));
        assert!(matches!(
            input.double_integrated_value(),
            Err(SensorError::Unsupported(_))
        ));
    }

    #[test]
    fn supported_integration_is_forwarded_with_sign() {
        let clock = SimClock::new();
        let mut input = AnalogInput::new("odo", Odometer, false, settings(), clock.shared());
        input.set_inverted(true);
        assert_eq!(input.integrated_value().unwrap().value, -4.0);
        assert_eq!(input.raw_value().unwrap().value, -1.0);
    }

    #[test]
    fn calibration_and_deadband_apply() {
        let clock = SimClock::new();
        let src = Level {
            clock: clock.clone(),
            value: 2.0,
        };
        let mut input = AnalogInput::new("pot", src, true, settings(), clock.shared());
        let cal = input.calibrate().unwrap();
        assert_eq!(cal.zero_offset, 2.0);
        assert_eq!(input.value().unwrap().value, 0.0);

        input.set_calibration(AxisCalibration {
            zero_offset: 0.5,
            deadband: 0.1,
        });
        assert_eq!(input.value().unwrap().value, 1.5);
    }
}
