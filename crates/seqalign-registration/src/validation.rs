//! Validation utilities and convergence monitoring for registration runs.

use crate::error::{RegistrationError, Result};

/// Validate learning rate.
pub fn validate_learning_rate(lr: f64) -> Result<()> {
    if !lr.is_finite() || lr <= 0.0 {
        return Err(RegistrationError::invalid_configuration(format!(
            "Learning rate must be positive, got {}",
            lr
        )));
    }
    Ok(())
}

/// Validate iteration count.
pub fn validate_iterations(iterations: usize) -> Result<()> {
    if iterations == 0 {
        return Err(RegistrationError::invalid_configuration("Iterations must be positive"));
    }

    if iterations > 1_000_000 {
        return Err(RegistrationError::invalid_configuration(format!(
            "Iterations too large: {}",
            iterations
        )));
    }

    Ok(())
}

/// Validate the histogram size of a mutual information metric.
///
/// The Parzen windows need two padding bins on each side, so fewer than five
/// bins leave no room for intensities.
pub fn validate_histogram_bins(num_bins: usize) -> Result<()> {
    if num_bins < 5 {
        return Err(RegistrationError::invalid_configuration(format!(
            "Number of bins must be at least 5, got {}",
            num_bins
        )));
    }

    if num_bins > 1024 {
        return Err(RegistrationError::invalid_configuration(format!(
            "Number of bins too large: {}",
            num_bins
        )));
    }

    Ok(())
}

/// Validate a sampling fraction.
pub fn validate_sampling_percentage(percentage: f64) -> Result<()> {
    if !(percentage > 0.0 && percentage <= 1.0) {
        return Err(RegistrationError::invalid_configuration(format!(
            "Sampling percentage must lie in (0, 1], got {}",
            percentage
        )));
    }
    Ok(())
}

/// Window-based convergence test on the metric history.
///
/// The last `window_size` metric values are rescaled to `[0, 1]` and fitted
/// with a least-squares line over a unit abscissa. The convergence value is the
/// negated slope, i.e. how fast the metric is still decreasing; the run has
/// converged once it drops to `minimum_value` or below.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceChecker {
    pub minimum_value: f64,
    pub window_size: usize,
}

impl Default for ConvergenceChecker {
    fn default() -> Self {
        Self {
            minimum_value: 1e-6,
            window_size: 10,
        }
    }
}

impl ConvergenceChecker {
    /// Create a new convergence checker.
    pub fn new(minimum_value: f64, window_size: usize) -> Self {
        Self {
            minimum_value,
            window_size,
        }
    }

    /// `None` until the history fills a window.
    pub fn convergence_value(&self, history: &[f64]) -> Option<f64> {
        if self.window_size < 2 || history.len() < self.window_size {
            return None;
        }
        let window = &history[history.len() - self.window_size..];

        let (lo, hi) = window
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let range = hi - lo;
        if !range.is_finite() {
            return None;
        }
        if range <= f64::EPSILON * hi.abs().max(1.0) {
            return Some(0.0);
        }

        let n = window.len() as f64;
        let last = (window.len() - 1) as f64;
        let xs = (0..window.len()).map(|k| k as f64 / last);
        let ys = window.iter().map(|v| (v - lo) / range);

        let mean_x = xs.clone().sum::<f64>() / n;
        let mean_y = ys.clone().sum::<f64>() / n;
        let (cov, var) = xs.zip(ys).fold((0.0, 0.0), |(cov, var), (x, y)| {
            (cov + (x - mean_x) * (y - mean_y), var + (x - mean_x) * (x - mean_x))
        });

        Some(-(cov / var))
    }

    /// Check if converged based on the metric history.
    pub fn check_convergence(&self, history: &[f64]) -> bool {
        self.convergence_value(history)
            .map(|value| value <= self.minimum_value)
            .unwrap_or(false)
    }
}
