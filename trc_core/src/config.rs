//! Core configuration.
//!
//! Loaded from TOML; every section and field has a default so an empty file
//! is a valid configuration.
//!
//! # TOML Example
//!
//! ```toml
//! [shared]
//! log_level = "debug"
//! service_name = "robot"
//!
//! [scheduler]
//! periodic_interval_ms = 20
//! continuous_interval_ms = 5
//!
//! [sensor]
//! stale_time_ms = 5
//! calibration_samples = 100
//! calibration_interval_ms = 10
//!
//! [kalman]
//! process_noise = 0.022
//! measurement_noise = 0.617
//!
//! [i2c]
//! max_transfer_len = 26
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub use crate::error::ConfigError;

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

/// Fields shared by every binary built on the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedConfig {
    /// Logging verbosity level.
    pub log_level: LogLevel,
    /// Instance identifier used in log output.
    pub service_name: String,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            service_name: "trc".to_string(),
        }
    }
}

/// Scheduler pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Interval of the main periodic phases [ms].
    pub periodic_interval_ms: u64,
    /// Interval between runner ticks (continuous phases) [ms].
    pub continuous_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            periodic_interval_ms: 20,
            continuous_interval_ms: 5,
        }
    }
}

impl SchedulerConfig {
    /// Periodic phase interval.
    pub fn periodic_interval(&self) -> Duration {
        Duration::from_millis(self.periodic_interval_ms)
    }

    /// Runner tick interval.
    pub fn continuous_interval(&self) -> Duration {
        Duration::from_millis(self.continuous_interval_ms)
    }
}

/// Sensor sampling and calibration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Maximum age of a cached sample before the source is read again [ms].
    pub stale_time_ms: u64,
    /// Number of raw samples taken by a calibration run.
    pub calibration_samples: usize,
    /// Delay between calibration samples [ms].
    pub calibration_interval_ms: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            stale_time_ms: 5,
            calibration_samples: 100,
            calibration_interval_ms: 10,
        }
    }
}

impl SensorConfig {
    /// Staleness threshold.
    pub fn stale_time(&self) -> Duration {
        Duration::from_millis(self.stale_time_ms)
    }

    /// Spacing between calibration samples.
    pub fn calibration_interval(&self) -> Duration {
        Duration::from_millis(self.calibration_interval_ms)
    }
}

/// Scalar Kalman filter noise terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanConfig {
    /// Process noise covariance (Q).
    pub process_noise: f64,
    /// Measurement noise covariance (R).
    pub measurement_noise: f64,
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self {
            process_noise: 0.022,
            measurement_noise: 0.617,
        }
    }
}

/// I2C transport limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct I2cConfig {
    /// Largest single transfer the port buffer can hold [bytes].
    pub max_transfer_len: usize,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self {
            max_transfer_len: 26,
        }
    }
}

/// Top-level core configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Shared fields.
    pub shared: SharedConfig,
    /// Scheduler pacing.
    pub scheduler: SchedulerConfig,
    /// Sensor sampling.
    pub sensor: SensorConfig,
    /// Kalman filter defaults.
    pub kalman: KalmanConfig,
    /// I2C limits.
    pub i2c: I2cConfig,
}

impl CoreConfig {
    /// Load and validate configuration from a TOML file.
    ///
    /// # Errors
    /// - `ConfigError::FileNotFound` if the file does not exist
    /// - `ConfigError::ParseError` if TOML syntax is invalid
    /// - `ConfigError::ValidationError` if semantic validation fails
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shared.service_name.is_empty() {
            return Err(invalid("shared.service_name cannot be empty"));
        }
        if self.scheduler.periodic_interval_ms == 0 {
            return Err(invalid("scheduler.periodic_interval_ms must be > 0"));
        }
        if self.scheduler.continuous_interval_ms == 0 {
            return Err(invalid("scheduler.continuous_interval_ms must be > 0"));
        }
        if self.scheduler.continuous_interval_ms > self.scheduler.periodic_interval_ms {
            return Err(invalid(
                "scheduler.continuous_interval_ms must not exceed periodic_interval_ms",
            ));
        }
        if self.sensor.calibration_samples == 0 {
            return Err(invalid("sensor.calibration_samples must be > 0"));
        }
        if !(self.kalman.process_noise > 0.0) || !self.kalman.process_noise.is_finite() {
            return Err(invalid("kalman.process_noise must be a positive number"));
        }
        if !(self.kalman.measurement_noise > 0.0) || !self.kalman.measurement_noise.is_finite() {
            return Err(invalid("kalman.measurement_noise must be a positive number"));
        }
        if self.i2c.max_transfer_len == 0 {
            return Err(invalid("i2c.max_transfer_len must be > 0"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::ValidationError(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_document_uses_defaults() {
        let config = CoreConfig::from_toml("").unwrap();
        assert_eq!(config.scheduler.periodic_interval_ms, 20);
        assert_eq!(config.sensor.calibration_samples, 100);
        assert_eq!(config.i2c.max_transfer_len, 26);
        assert_eq!(config.shared.log_level, LogLevel::Info);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = CoreConfig::from_toml("[sensor]\nstale_time_ms = 8\n").unwrap();
        assert_eq!(config.sensor.stale_time(), Duration::from_millis(8));
        assert_eq!(config.sensor.calibration_interval(), Duration::from_millis(10));
    }

    #[test]
    fn zero_periodic_interval_rejected() {
        let result = CoreConfig::from_toml("[scheduler]\nperiodic_interval_ms = 0\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn continuous_slower_than_periodic_rejected() {
        let result = CoreConfig::from_toml(
            "[scheduler]\nperiodic_interval_ms = 10\ncontinuous_interval_ms = 20\n",
        );
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn negative_noise_rejected() {
        let result = CoreConfig::from_toml("[kalman]\nprocess_noise = -1.0\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn log_level_deserialization() {
        let config = CoreConfig::from_toml("[shared]\nlog_level = \"trace\"\n").unwrap();
        assert_eq!(config.shared.log_level, LogLevel::Trace);
    }

    #[test]
    fn load_file_not_found() {
        let result = CoreConfig::load(Path::new("/nonexistent/path/trc.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound)));
    }

    #[test]
    fn load_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid toml {{{{").unwrap();
        let result = CoreConfig::load(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn load_success() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[shared]
service_name = "test-robot"

[i2c]
max_transfer_len = 16
"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = CoreConfig::load(file.path()).unwrap();
        assert_eq!(config.shared.service_name, "test-robot");
        assert_eq!(config.i2c.max_transfer_len, 16);
    }
}
