//! Learning-rate relaxation for regular-step gradient descent.
//!
//! A fixed learning rate that is right far from the optimum overshoots near
//! it, and the descent then bounces across the minimum. The rate is shrunk
//! every time the last step overshot: the metric went up, or the gradient
//! turned around.

use crate::error::{RegistrationError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepRelaxation {
    /// Multiplier applied to the learning rate after an overshoot, in `(0, 1]`.
    pub factor: f64,
    /// A level stops once its rate falls below this fraction of the rate it started with.
    pub minimum_fraction: f64,
}

impl Default for StepRelaxation {
    fn default() -> Self {
        Self {
            factor: 0.5,
            minimum_fraction: 1e-4,
        }
    }
}

impl StepRelaxation {
    pub fn new(factor: f64, minimum_fraction: f64) -> Self {
        Self {
            factor,
            minimum_fraction,
        }
    }

    /// No relaxation at all; the learning rate stays fixed.
    pub fn disabled() -> Self {
        Self::new(1.0, 0.0)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.factor > 0.0 && self.factor <= 1.0) {
            return Err(RegistrationError::invalid_configuration(format!(
                "relaxation factor must lie in (0, 1], got {}",
                self.factor
            )));
        }
        if !(self.minimum_fraction >= 0.0 && self.minimum_fraction < 1.0) {
            return Err(RegistrationError::invalid_configuration(format!(
                "minimum learning-rate fraction must lie in [0, 1), got {}",
                self.minimum_fraction
            )));
        }
        Ok(())
    }

    /// Whether the step between two evaluations went past a minimum.
    pub fn overshot(&self, previous_value: f64, previous_gradient: &[f64], value: f64, gradient: &[f64]) -> bool {
        let turned: f64 = previous_gradient.iter().zip(gradient).map(|(a, b)| a * b).sum();
        value > previous_value || turned < 0.0
    }

    pub fn relax(&self, learning_rate: f64) -> f64 {
        learning_rate * self.factor
    }

    pub fn is_exhausted(&self, learning_rate: f64, starting_rate: f64) -> bool {
        learning_rate < starting_rate * self.minimum_fraction
    }
}
