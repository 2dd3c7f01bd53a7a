//! Error types for the control core.
//!
//! One enum per concern. Configuration-class errors are returned at the call
//! boundary before any state is touched; transient hardware non-readiness is
//! never an error (the state machines simply stay where they are).

use std::time::Duration;
use thiserror::Error;

use crate::sensor::Axis;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Rejected timer arm request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimerError {
    /// Duration was negative, NaN or infinite.
    #[error("invalid timer duration: {0}s")]
    InvalidDuration(f64),
    /// Deadline past the end of the clock range.
    #[error("timer deadline overflows the clock: {0:?} from now")]
    Overflow(Duration),
}

/// Sensor pipeline errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensorError {
    /// The physical source does not provide this capability.
    #[error("unsupported sensor operation: {0}")]
    Unsupported(&'static str),

    /// The raw-data source failed to produce a sample.
    #[error("sensor source error: {0}")]
    Source(String),

    /// Velocity/distance requested for an axis without an integrator.
    #[error("axis {0:?} is not integrated")]
    NotIntegrated(Axis),

    /// Calibration could not be computed.
    #[error("invalid calibration: {0}")]
    InvalidCalibration(String),
}

/// Rejected I2C request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum I2cError {
    /// Zero-length transfer.
    #[error("transfer length must be non-zero")]
    InvalidLength,

    /// Transfer longer than the port buffer.
    #[error("transfer of {len} bytes exceeds the {max}-byte port buffer")]
    TransferTooLong {
        /// Requested length.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Write payload does not match the declared length.
    #[error("write payload is {actual} bytes, expected {expected}")]
    PayloadMismatch {
        /// Declared length.
        expected: usize,
        /// Payload length.
        actual: usize,
    },
}

/// Motor controller errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MotorError {
    /// Power was NaN or infinite.
    #[error("invalid motor power: {0}")]
    InvalidPower(f64),

    /// The controller does not provide this capability.
    #[error("unsupported motor operation: {0}")]
    Unsupported(&'static str),
}

/// Error returned from a task callback.
///
/// The task manager logs it and carries on with the next task in the phase.
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    /// Generic failure with a message.
    #[error("{0}")]
    Failed(String),

    /// Sensor failure inside the task.
    #[error(transparent)]
    Sensor(#[from] SensorError),

    /// Device request failure inside the task.
    #[error(transparent)]
    Device(#[from] I2cError),

    /// Timer failure inside the task.
    #[error(transparent)]
    Timer(#[from] TimerError),

    /// Motor failure inside the task.
    #[error(transparent)]
    Motor(#[from] MotorError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i2c_error_display_mentions_limits() {
        let err = I2cError::TransferTooLong { len: 40, max: 26 };
        let msg = err.to_string();
        assert!(msg.contains("40"));
        assert!(msg.contains("26"));
    }

    #[test]
    fn task_error_wraps_sensor_error() {
        let err: TaskError = SensorError::Unsupported("integrated data").into();
        assert!(matches!(err, TaskError::Sensor(SensorError::Unsupported(_))));
        assert!(err.to_string().contains("integrated data"));
    }

    #[test]
    fn not_integrated_names_axis() {
        let err = SensorError::NotIntegrated(Axis::Z);
        assert!(err.to_string().contains('Z'));
    }
}
