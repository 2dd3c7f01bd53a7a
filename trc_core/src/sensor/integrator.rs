//! Time integration of a sampled signal.

use std::time::Duration;

use super::data::SensorData;

/// Rectangular-rule double integrator.
///
/// Each sample after the first contributes `a·dt` to the first integral
/// (velocity) and then `v·dt` to the second (position), where `dt` is the
/// difference between sample timestamps. The first sample only records its
/// timestamp; a sample not newer than the previous one contributes nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Integrator {
    last_timestamp: Option<Duration>,
    velocity: f64,
    position: f64,
}

impl Integrator {
    /// Zeroed integrator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Integrate one sample.
    pub fn update(&mut self, sample: SensorData) {
        if let Some(last) = self.last_timestamp {
            if sample.timestamp <= last {
                return;
            }
            let dt = (sample.timestamp - last).as_secs_f64();
            self.velocity += sample.value * dt;
            self.position += self.velocity * dt;
        }
        self.last_timestamp = Some(sample.timestamp);
    }

    /// First integral.
    #[inline]
    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    /// Second integral.
    #[inline]
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Zero both integrals and forget the last timestamp.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: u64, v: f64) -> SensorData {
        SensorData::new(Duration::from_millis(ms), v)
    }

    #[test]
    fn first_sample_only_records_timestamp() {
        let mut i = Integrator::new();
        i.update(at(100, 5.0));
        assert_eq!(i.velocity(), 0.0);
        assert_eq!(i.position(), 0.0);
    }

    #[test]
    fn constant_acceleration() {
        let mut i = Integrator::new();
        i.update(at(0, 2.0));
        i.update(at(500, 2.0));
        assert!((i.velocity() - 1.0).abs() < 1e-12);
        assert!((i.position() - 0.5).abs() < 1e-12);
        i.update(at(1000, 2.0));
        assert!((i.velocity() - 2.0).abs() < 1e-12);
        assert!((i.position() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn repeated_timestamp_contributes_nothing() {
        let mut i = Integrator::new();
        i.update(at(0, 1.0));
        i.update(at(10, 1.0));
        let v = i.velocity();
        i.update(at(10, 100.0));
        assert_eq!(i.velocity(), v);
    }

    #[test]
    fn reset_zeroes_and_forgets_timestamp() {
        let mut i = Integrator::new();
        i.update(at(0, 1.0));
        i.update(at(1000, 1.0));
        i.reset();
        assert_eq!(i, Integrator::new());
        i.update(at(5000, 1.0));
        assert_eq!(i.velocity(), 0.0);
    }
}
