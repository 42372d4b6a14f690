//! Rigid registration of one moving volume onto a fixed volume.
//!
//! [`ImageRegistrationMethod`] wires the centered initializer, Mattes mutual
//! information, gradient descent and the resolution pyramid together, then
//! resamples the moving volume onto the fixed grid with the result.

use crate::error::{RegistrationError, Result};
use crate::initializer::CenteredTransformInitializer;
use crate::metric::{MattesMutualInformation, SamplingStrategy};
use crate::multires::{MultiResolutionRegistration, RegistrationSchedule};
use crate::optimizer::{GradientDescentOptimizer, LearningRateEstimation, LevelReport, ScalesMode, StepRelaxation};
use crate::progress::{ProgressCallback, ProgressTracker};
use crate::validation::{validate_histogram_bins, validate_iterations, validate_learning_rate, ConvergenceChecker};
use burn::tensor::backend::AutodiffBackend;
use rand::RngCore;
use seqalign_core::filter::ResampleImageFilter;
use seqalign_core::interpolation::{Interpolation, LinearInterpolator};
use seqalign_core::transform::{Euler3DTransform, ParametricTransform};
use seqalign_core::Image;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

/// Settings of a registration run.
///
/// Missing fields take their defaults when deserialized, so a JSON file only
/// needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Histogram bins of the mutual-information metric.
    pub histogram_bins: usize,
    pub sampling: SamplingStrategy,
    /// Interpolator for the moving image during metric evaluation.
    pub interpolation: Interpolation,
    pub learning_rate: f64,
    /// Iteration budget per pyramid level.
    pub iterations: usize,
    pub learning_rate_estimation: LearningRateEstimation,
    /// Largest first step in millimetres when the learning rate is estimated.
    pub maximum_step_size: Option<f64>,
    /// How the learning rate shrinks when a step overshoots.
    pub relaxation: StepRelaxation,
    pub schedule: RegistrationSchedule,
    pub convergence_minimum_value: f64,
    pub convergence_window_size: usize,
    pub scales: ScalesMode,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            histogram_bins: 50,
            sampling: SamplingStrategy::Random { percentage: 0.01 },
            interpolation: Interpolation::BSpline,
            learning_rate: 1.0,
            iterations: 100,
            learning_rate_estimation: LearningRateEstimation::Once,
            maximum_step_size: None,
            relaxation: StepRelaxation::default(),
            schedule: RegistrationSchedule::default(),
            convergence_minimum_value: 1e-6,
            convergence_window_size: 10,
            scales: ScalesMode::PhysicalShift,
        }
    }
}

impl RegistrationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_histogram_bins(mut self, bins: usize) -> Self {
        self.histogram_bins = bins;
        self
    }

    pub fn with_sampling(mut self, sampling: SamplingStrategy) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_learning_rate_estimation(mut self, estimation: LearningRateEstimation) -> Self {
        self.learning_rate_estimation = estimation;
        self
    }

    pub fn with_maximum_step_size(mut self, step: f64) -> Self {
        self.maximum_step_size = Some(step);
        self
    }

    pub fn with_relaxation(mut self, relaxation: StepRelaxation) -> Self {
        self.relaxation = relaxation;
        self
    }

    pub fn with_schedule(mut self, schedule: RegistrationSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_convergence(mut self, minimum_value: f64, window_size: usize) -> Self {
        self.convergence_minimum_value = minimum_value;
        self.convergence_window_size = window_size;
        self
    }

    pub fn with_scales(mut self, scales: ScalesMode) -> Self {
        self.scales = scales;
        self
    }

    /// Reject settings that cannot run.
    pub fn validate(&self) -> Result<()> {
        validate_histogram_bins(self.histogram_bins)?;
        self.sampling.validate()?;
        validate_learning_rate(self.learning_rate)?;
        validate_iterations(self.iterations)?;
        self.schedule.validate()?;
        self.relaxation.validate()?;
        if let Some(step) = self.maximum_step_size {
            if !step.is_finite() || step <= 0.0 {
                return Err(RegistrationError::invalid_configuration(format!(
                    "maximum step size must be positive, got {step}"
                )));
            }
        }
        if !self.convergence_minimum_value.is_finite() || self.convergence_minimum_value < 0.0 {
            return Err(RegistrationError::invalid_configuration(
                "convergence minimum value must be finite and non-negative",
            ));
        }
        if self.convergence_window_size < 2 {
            return Err(RegistrationError::invalid_configuration(format!(
                "convergence window needs at least 2 values, got {}",
                self.convergence_window_size
            )));
        }
        Ok(())
    }

    fn metric(&self) -> Result<MattesMutualInformation> {
        Ok(MattesMutualInformation::new(self.histogram_bins)?
            .with_sampling(self.sampling)?
            .with_interpolation(self.interpolation))
    }

    fn optimizer(&self) -> Result<GradientDescentOptimizer> {
        Ok(GradientDescentOptimizer::new(self.learning_rate, self.iterations)?
            .with_convergence(ConvergenceChecker::new(
                self.convergence_minimum_value,
                self.convergence_window_size,
            ))
            .with_learning_rate_estimation(self.learning_rate_estimation)
            .with_maximum_step_size(self.maximum_step_size)
            .with_relaxation(self.relaxation)?)
    }
}

/// Random source and optional diagnostics sink for one registration call.
pub struct RegistrationContext<'a> {
    pub rng: &'a mut dyn RngCore,
    pub callback: Option<&'a dyn ProgressCallback>,
}

impl<'a> RegistrationContext<'a> {
    pub fn new(rng: &'a mut dyn RngCore) -> Self {
        Self { rng, callback: None }
    }

    pub fn with_callback(mut self, callback: &'a dyn ProgressCallback) -> Self {
        self.callback = Some(callback);
        self
    }
}

/// Outcome of [`ImageRegistrationMethod::register`].
#[derive(Debug, Clone)]
pub struct RegistrationResult<B: AutodiffBackend> {
    /// Maps fixed physical space to moving physical space.
    pub transform: Euler3DTransform,
    /// The moving image on the fixed image's grid.
    pub resampled: Image<B, 3>,
    pub levels: Vec<LevelReport>,
}

/// Rigid mutual-information registration.
pub struct ImageRegistrationMethod<B: AutodiffBackend> {
    config: RegistrationConfig,
    _phantom: PhantomData<B>,
}

impl<B: AutodiffBackend> Default for ImageRegistrationMethod<B> {
    fn default() -> Self {
        Self::new(RegistrationConfig::default())
    }
}

impl<B: AutodiffBackend> ImageRegistrationMethod<B> {
    pub fn new(config: RegistrationConfig) -> Self {
        Self {
            config,
            _phantom: PhantomData,
        }
    }

    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    /// Align `moving` onto `fixed`.
    ///
    /// The returned image is always built on `fixed`'s grid. Alignment
    /// quality is not checked here; attach a callback such as
    /// [`DivergenceMonitor`](crate::progress::DivergenceMonitor) to watch it.
    pub fn register(
        &self,
        moving: &Image<B, 3>,
        fixed: &Image<B, 3>,
        ctx: RegistrationContext<'_>,
    ) -> Result<RegistrationResult<B>> {
        let mut tracker = ProgressTracker::new(ctx.callback);
        tracker.start();
        let outcome = self.run(moving, fixed, ctx.rng, &tracker);
        if let Err(e) = &outcome {
            tracker.error(&e.to_string());
        }
        outcome
    }

    fn run(
        &self,
        moving: &Image<B, 3>,
        fixed: &Image<B, 3>,
        rng: &mut dyn RngCore,
        tracker: &ProgressTracker<'_>,
    ) -> Result<RegistrationResult<B>> {
        self.config.validate()?;

        let initial = CenteredTransformInitializer::geometry(fixed, moving);
        tracing::debug!(
            center = ?initial.center().to_array(),
            translation = ?initial.translation(),
            "initial transform"
        );

        let registration =
            MultiResolutionRegistration::new(self.config.metric()?, self.config.optimizer()?, self.config.schedule.clone())
                .with_scales(self.config.scales);
        let (transform, levels) = registration.execute(fixed, moving, initial, rng, tracker)?;

        tracing::info!(
            angles = ?transform.angles(),
            translation = ?transform.translation(),
            "registration finished"
        );

        let resampled = ResampleImageFilter::new_from_reference(fixed, transform, LinearInterpolator::new()).apply(moving);
        Ok(RegistrationResult {
            transform,
            resampled,
            levels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = RegistrationConfig::default();
        assert_eq!(config.histogram_bins, 50);
        assert_eq!(config.sampling, SamplingStrategy::Random { percentage: 0.01 });
        assert_eq!(config.interpolation, Interpolation::BSpline);
        assert_eq!(config.learning_rate, 1.0);
        assert_eq!(config.iterations, 100);
        assert_eq!(config.schedule.shrink_factors, vec![4, 2, 1]);
        assert_eq!(config.schedule.smoothing_sigmas, vec![2.0, 1.0, 0.0]);
        assert!(config.schedule.sigmas_in_physical_units);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert!(RegistrationConfig::new().with_histogram_bins(1).validate().is_err());
        assert!(RegistrationConfig::new().with_learning_rate(-1.0).validate().is_err());
        assert!(RegistrationConfig::new()
            .with_sampling(SamplingStrategy::Random { percentage: 1.5 })
            .validate()
            .is_err());
        assert!(RegistrationConfig::new()
            .with_schedule(RegistrationSchedule::new(vec![2, 1], vec![1.0]))
            .validate()
            .is_err());
        assert!(RegistrationConfig::new().with_convergence(1e-6, 1).validate().is_err());
        assert!(RegistrationConfig::new()
            .with_relaxation(StepRelaxation::new(2.0, 1e-4))
            .validate()
            .is_err());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: RegistrationConfig = serde_json::from_str(r#"{"iterations": 20, "sampling": {"kind": "full"}}"#).unwrap();
        assert_eq!(config.iterations, 20);
        assert_eq!(config.sampling, SamplingStrategy::Full);
        assert_eq!(config.histogram_bins, 50);
        assert_eq!(config.learning_rate_estimation, LearningRateEstimation::Once);
        assert_eq!(config.relaxation, StepRelaxation::default());

        let config: RegistrationConfig = serde_json::from_str(r#"{"relaxation": {"factor": 0.8}}"#).unwrap();
        assert_eq!(config.relaxation.factor, 0.8);
        assert_eq!(config.relaxation.minimum_fraction, 1e-4);
    }
}
