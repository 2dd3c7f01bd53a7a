//! Motor controller capability.
//!
//! The core never talks to a motor directly: concrete drivers (hardware or
//! simulated) implement [`MotorController`] and behaviors hold them as
//! trait objects or generics. Two helpers carry the parts every driver
//! shares: [`limit_power`] for limit-switch gating and [`SoftEncoder`] for
//! software position zeroing.

use crate::error::MotorError;

/// Platform-independent motor with a position sensor and optional limit
/// switches.
pub trait MotorController: Send {
    /// Instance name.
    fn name(&self) -> &str;

    /// Set power in `-1.0..=1.0` (values outside are clamped).
    ///
    /// Power towards an active limit switch is replaced by zero.
    ///
    /// # Errors
    /// `MotorError::InvalidPower` for NaN or infinite power; the motor keeps
    /// its previous power.
    fn set_power(&mut self, power: f64) -> Result<(), MotorError>;

    /// Invert the motor direction.
    fn set_inverted(&mut self, inverted: bool);

    /// Make the current position read as zero.
    fn reset_position(&mut self);

    /// Invert the position sensor, for encoders mounted against the motor
    /// rotation.
    fn set_position_sensor_inverted(&mut self, inverted: bool);

    /// Position sensor reading since the last reset.
    fn position(&self) -> f64;

    /// Rotation speed in position units per second.
    fn speed(&self) -> Result<f64, MotorError> {
        Err(MotorError::Unsupported("motor speed"))
    }

    /// Whether the reverse limit switch is closed.
    fn is_reverse_limit_active(&self) -> bool {
        false
    }

    /// Whether the forward limit switch is closed.
    fn is_forward_limit_active(&self) -> bool {
        false
    }
}

impl<T: MotorController + ?Sized> MotorController for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn set_power(&mut self, power: f64) -> Result<(), MotorError> {
        (**self).set_power(power)
    }

    fn set_inverted(&mut self, inverted: bool) {
        (**self).set_inverted(inverted)
    }

    fn reset_position(&mut self) {
        (**self).reset_position()
    }

    fn set_position_sensor_inverted(&mut self, inverted: bool) {
        (**self).set_position_sensor_inverted(inverted)
    }

    fn position(&self) -> f64 {
        (**self).position()
    }

    fn speed(&self) -> Result<f64, MotorError> {
        (**self).speed()
    }

    fn is_reverse_limit_active(&self) -> bool {
        (**self).is_reverse_limit_active()
    }

    fn is_forward_limit_active(&self) -> bool {
        (**self).is_forward_limit_active()
    }
}

/// Power to apply given the requested power and the limit switch states.
///
/// # Errors
/// `MotorError::InvalidPower` if `power` is not finite.
pub fn limit_power(
    power: f64,
    forward_active: bool,
    reverse_active: bool,
) -> Result<f64, MotorError> {
    if !power.is_finite() {
        return Err(MotorError::InvalidPower(power));
    }
    let power = power.clamp(-1.0, 1.0);
    if (power > 0.0 && forward_active) || (power < 0.0 && reverse_active) {
        Ok(0.0)
    } else {
        Ok(power)
    }
}

/// Software zero and direction for a raw position counter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoftEncoder {
    zero: f64,
    sign: f64,
}

impl SoftEncoder {
    /// Zero at raw 0, not inverted.
    pub const fn new() -> Self {
        Self {
            zero: 0.0,
            sign: 1.0,
        }
    }

    /// Take `raw` as the new zero.
    pub fn reset(&mut self, raw: f64) {
        self.zero = raw;
    }

    /// Invert the reading direction.
    pub fn set_inverted(&mut self, inverted: bool) {
        self.sign = if inverted { -1.0 } else { 1.0 };
    }

    /// Reading direction (`1.0` or `-1.0`).
    #[inline]
    pub fn sign(&self) -> f64 {
        self.sign
    }

    /// Position for the raw counter value.
    #[inline]
    pub fn position(&self, raw: f64) -> f64 {
        self.sign * (raw - self.zero)
    }
}

impl Default for SoftEncoder {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
