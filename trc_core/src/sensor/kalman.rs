//! Scalar noise filters.

/// A stateful one-in, one-out filter stage.
pub trait SensorFilter: Send {
    /// Feed one measurement and return the filtered estimate.
    fn filter(&mut self, measurement: f64) -> f64;

    /// Forget all history.
    fn reset(&mut self);
}

/// One-dimensional Kalman filter with constant process and measurement noise.
///
/// The first measurement seeds the estimate, so the filter never drags its
/// output up from zero.
#[derive(Debug, Clone, PartialEq)]
pub struct KalmanFilter {
    process_noise: f64,
    measurement_noise: f64,
    estimate: Option<f64>,
    error_covariance: f64,
}

impl KalmanFilter {
    /// Default process noise (Q).
    pub const DEFAULT_PROCESS_NOISE: f64 = 0.022;
    /// Default measurement noise (R).
    pub const DEFAULT_MEASUREMENT_NOISE: f64 = 0.617;

    /// Create a filter with the given noise terms.
    pub fn new(process_noise: f64, measurement_noise: f64) -> Self {
        Self {
            process_noise,
            measurement_noise,
            estimate: None,
            error_covariance: 0.0,
        }
    }

    /// Current estimate, if any measurement has been seen.
    pub fn estimate(&self) -> Option<f64> {
        self.estimate
    }
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PROCESS_NOISE, Self::DEFAULT_MEASUREMENT_NOISE)
    }
}

impl SensorFilter for KalmanFilter {
    fn filter(&mut self, measurement: f64) -> f64 {
        let prior = self.estimate.unwrap_or(measurement);
        let p = self.error_covariance + self.process_noise;
        let gain = p / (p + self.measurement_noise);
        let estimate = prior + gain * (measurement - prior);
        self.error_covariance = (1.0 - gain) * p;
        self.estimate = Some(estimate);
        estimate
    }

    fn reset(&mut self) {
        self.estimate = None;
        self.error_covariance = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_seeds_estimate() {
        let mut k = KalmanFilter::default();
        assert_eq!(k.filter(9.81), 9.81);
    }

    #[test]
    fn constant_input_is_a_fixed_point() {
        let mut k = KalmanFilter::default();
        for _ in 0..50 {
            assert!((k.filter(2.0) - 2.0).abs() < 1e-12);
        }
    }

    #[test]
    fn step_is_approached_monotonically() {
        let mut k = KalmanFilter::default();
        k.filter(0.0);
        let mut prev = 0.0;
        for _ in 0..30 {
            let v = k.filter(1.0);
            assert!(v > prev && v < 1.0);
            prev = v;
        }
    }

    #[test]
    fn reset_forgets_history() {
        let mut k = KalmanFilter::default();
        k.filter(5.0);
        k.filter(6.0);
        k.reset();
        assert_eq!(k.estimate(), None);
        assert_eq!(k.filter(-1.0), -1.0);
    }
}
