//! Simulated DC motor with encoder and limit switches.

use std::time::Duration;
use tracing::trace;

use trc_core::clock::SharedClock;
use trc_core::error::MotorError;
use trc_core::motor::{MotorController, SoftEncoder, limit_power};

use super::accel::AccelCommand;

/// DC motor whose encoder advances at `ticks_per_sec × power`.
///
/// Position is evaluated lazily from the clock, so the motor needs no task.
/// Optional limit switches close at fixed raw encoder counts and act as hard
/// stops. A motor built [`with_thrust`](SimMotor::with_thrust) also commands
/// the simulated accelerometer in proportion to its power.
pub struct SimMotor {
    name: String,
    clock: SharedClock,
    ticks_per_sec: f64,
    direction: f64,
    power: f64,
    raw: f64,
    since: Duration,
    reverse_stop: f64,
    forward_stop: f64,
    encoder: SoftEncoder,
    thrust: Option<(AccelCommand, f64)>,
}

impl SimMotor {
    /// Motor with no limit switches.
    pub fn new(name: impl Into<String>, clock: SharedClock, ticks_per_sec: f64) -> Self {
        let since = clock.now();
        Self {
            name: name.into(),
            clock,
            ticks_per_sec,
            direction: 1.0,
            power: 0.0,
            raw: 0.0,
            since,
            reverse_stop: f64::NEG_INFINITY,
            forward_stop: f64::INFINITY,
            encoder: SoftEncoder::new(),
            thrust: None,
        }
    }

    /// Add limit switches that close at raw encoder counts `reverse` and
    /// `forward`.
    pub fn with_limits(mut self, reverse: f64, forward: f64) -> Self {
        self.reverse_stop = reverse;
        self.forward_stop = forward;
        self
    }

    /// Drive `command` along X with `accel_per_power` m/s² per unit power.
    pub fn with_thrust(mut self, command: AccelCommand, accel_per_power: f64) -> Self {
        self.thrust = Some((command, accel_per_power));
        self
    }

    /// Power currently applied, after clamping and limit gating.
    pub fn power(&self) -> f64 {
        self.power
    }

    fn raw_now(&self) -> f64 {
        let dt = self.clock.now().saturating_sub(self.since).as_secs_f64();
        let raw = self.raw + self.direction * self.power * self.ticks_per_sec * dt;
        raw.clamp(self.reverse_stop, self.forward_stop)
    }

    /// Fold the travel so far into `raw` before the motion parameters change.
    fn rebase(&mut self) {
        self.raw = self.raw_now();
        self.since = self.clock.now();
    }

    fn apply_thrust(&self) {
        if let Some((command, gain)) = &self.thrust {
            command.set(self.direction * self.power * gain, 0.0, 0.0);
        }
    }
}

impl MotorController for SimMotor {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_power(&mut self, power: f64) -> Result<(), MotorError> {
        let applied = limit_power(
            power,
            self.is_forward_limit_active(),
            self.is_reverse_limit_active(),
        )?;
        self.rebase();
        self.power = applied;
        self.apply_thrust();
        trace!(motor = %self.name, requested = power, applied, "motor power set");
        Ok(())
    }

    fn set_inverted(&mut self, inverted: bool) {
        self.rebase();
        self.direction = if inverted { -1.0 } else { 1.0 };
        self.apply_thrust();
    }

    fn reset_position(&mut self) {
        self.rebase();
        self.encoder.reset(self.raw);
    }

    fn set_position_sensor_inverted(&mut self, inverted: bool) {
        self.encoder.set_inverted(inverted);
    }

    fn position(&self) -> f64 {
        self.encoder.position(self.raw_now())
    }

    fn speed(&self) -> Result<f64, MotorError> {
        let velocity = self.direction * self.power * self.ticks_per_sec;
        let raw = self.raw_now();
        let blocked = (velocity > 0.0 && raw >= self.forward_stop)
            || (velocity < 0.0 && raw <= self.reverse_stop);
        if blocked {
            Ok(0.0)
        } else {
            Ok(self.encoder.sign() * velocity)
        }
    }

    fn is_reverse_limit_active(&self) -> bool {
        self.raw_now() <= self.reverse_stop
    }

    fn is_forward_limit_active(&self) -> bool {
        self.raw_now() >= self.forward_stop
    }
}
