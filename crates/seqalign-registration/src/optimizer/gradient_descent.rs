//! Regular gradient descent on transform parameters.

use super::relaxation::StepRelaxation;
use super::scales::PhysicalShiftScalesEstimator;
use crate::error::{RegistrationError, Result};
use crate::metric::Metric;
use crate::progress::{ProgressInfo, ProgressTracker};
use crate::validation::{validate_iterations, validate_learning_rate, ConvergenceChecker};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{ElementConversion, Tensor, TensorData};
use rand::RngCore;
use seqalign_core::transform::ParametricTransform;
use seqalign_core::ImageGrid;
use serde::{Deserialize, Serialize};

/// When the learning rate is re-derived from the gradient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningRateEstimation {
    /// Use the configured learning rate as is.
    Never,
    /// At the first iteration of every level, pick the rate that moves the
    /// fixed grid by at most the maximum step size.
    #[default]
    Once,
}

/// Why a level stopped iterating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopCondition {
    MaximumIterations,
    Converged,
    /// The learning rate was relaxed below its floor.
    StepTooSmall,
    NonFiniteValue,
    NonFiniteUpdate,
}

/// Summary of one optimized pyramid level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelReport {
    pub level: usize,
    pub iterations: usize,
    /// Metric value of the returned parameters.
    pub final_value: f64,
    pub learning_rate: f64,
    pub stop: StopCondition,
}

/// Everything a single level needs besides the metric and the transform.
pub struct LevelContext<'a, 'r> {
    pub level: usize,
    pub grid: &'a ImageGrid<3>,
    pub scales: &'a [f64],
    pub rng: &'r mut dyn RngCore,
    pub tracker: &'a ProgressTracker<'a>,
}

/// Regular-step gradient descent with per-parameter scales.
///
/// Each iteration evaluates the metric and its gradient with automatic
/// differentiation, divides the gradient by the parameter scales and steps
/// `p <- p - lr * g / s`. Whenever a step overshoots, the learning rate is
/// relaxed (see [`StepRelaxation`]). A step that leaves the moving image sends
/// the descent back to the best parameters with a relaxed rate.
///
/// The level returns the best parameters it evaluated, so the result is never
/// worse than where the level started.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientDescentOptimizer {
    pub learning_rate: f64,
    pub iterations: usize,
    pub convergence: ConvergenceChecker,
    pub learning_rate_estimation: LearningRateEstimation,
    /// Step bound for learning-rate estimation; the smallest grid spacing when `None`.
    pub maximum_step_size: Option<f64>,
    pub relaxation: StepRelaxation,
}

impl Default for GradientDescentOptimizer {
    fn default() -> Self {
        Self {
            learning_rate: 1.0,
            iterations: 100,
            convergence: ConvergenceChecker::default(),
            learning_rate_estimation: LearningRateEstimation::Once,
            maximum_step_size: None,
            relaxation: StepRelaxation::default(),
        }
    }
}

/// Gradients whose unit step moves the grid by less than this fraction of the
/// maximum step are treated as zero by learning-rate estimation.
const NEGLIGIBLE_SHIFT: f64 = 1e-6;

fn to_f64_vec<B: burn::tensor::backend::Backend>(tensor: Tensor<B, 1>) -> Result<Vec<f64>> {
    tensor
        .into_data()
        .convert::<f64>()
        .to_vec::<f64>()
        .map_err(|e| RegistrationError::numerical_instability(format!("cannot read gradient: {e:?}")))
}

fn parameter_tensor<B: burn::tensor::backend::Backend>(parameters: &[f64], device: &B::Device) -> Tensor<B, 1> {
    let values: Vec<f32> = parameters.iter().map(|&p| p as f32).collect();
    Tensor::<B, 1>::from_data(TensorData::new(values, [parameters.len()]), device)
}

fn improves<T>(best: &Option<(f64, T)>, value: f64) -> bool {
    best.as_ref().map_or(true, |(best_value, _)| value < *best_value)
}

impl GradientDescentOptimizer {
    pub fn new(learning_rate: f64, iterations: usize) -> Result<Self> {
        validate_learning_rate(learning_rate)?;
        validate_iterations(iterations)?;
        Ok(Self {
            learning_rate,
            iterations,
            ..Self::default()
        })
    }

    pub fn with_convergence(mut self, convergence: ConvergenceChecker) -> Self {
        self.convergence = convergence;
        self
    }

    pub fn with_learning_rate_estimation(mut self, estimation: LearningRateEstimation) -> Self {
        self.learning_rate_estimation = estimation;
        self
    }

    pub fn with_maximum_step_size(mut self, step: Option<f64>) -> Self {
        self.maximum_step_size = step;
        self
    }

    pub fn with_relaxation(mut self, relaxation: StepRelaxation) -> Result<Self> {
        relaxation.validate()?;
        self.relaxation = relaxation;
        Ok(self)
    }

    fn estimate_learning_rate<T: ParametricTransform>(&self, transform: &T, scaled: &[f64], grid: &ImageGrid<3>) -> Result<f64> {
        let max_step = self
            .maximum_step_size
            .unwrap_or_else(|| grid.spacing().min_spacing());
        let shift = PhysicalShiftScalesEstimator::default().step_shift(transform, scaled, grid)?;
        if shift > max_step * NEGLIGIBLE_SHIFT {
            Ok(max_step / shift)
        } else {
            tracing::debug!(shift, "gradient is negligible, keeping the configured learning rate");
            Ok(self.learning_rate)
        }
    }

    /// Optimize `transform` on one level and return the best transform found.
    pub fn optimize<B, M, T>(
        &self,
        metric: &M,
        prepared: &M::Prepared,
        mut transform: T,
        ctx: LevelContext<'_, '_>,
    ) -> Result<(T, LevelReport)>
    where
        B: AutodiffBackend,
        M: Metric<B>,
        T: ParametricTransform,
    {
        let LevelContext {
            level,
            grid,
            scales,
            rng,
            tracker,
        } = ctx;
        let n = transform.number_of_parameters();
        if scales.len() != n {
            return Err(RegistrationError::dimension_mismatch(format!(
                "{} scales for {} parameters",
                scales.len(),
                n
            )));
        }

        let device = metric.device(prepared);
        let relaxation = self.relaxation;
        let mut learning_rate = self.learning_rate;
        let mut starting_rate = learning_rate;
        let mut history = Vec::with_capacity(self.iterations);
        let mut best: Option<(f64, T)> = None;
        let mut previous: Option<(f64, Vec<f64>)> = None;
        let mut stop = StopCondition::MaximumIterations;
        let mut iterations = 0;
        let mut unevaluated = false;

        for iteration in 0..self.iterations {
            iterations = iteration + 1;
            let current = transform.parameters();
            let params = parameter_tensor::<B>(&current, &device).require_grad();

            let loss = match metric.forward(prepared, &transform, params.clone(), &mut *rng) {
                Ok(loss) => loss,
                Err(RegistrationError::NumericalInstability(reason)) if best.is_some() => {
                    learning_rate = relaxation.relax(learning_rate);
                    tracing::debug!(level, iteration, learning_rate, %reason, "step left the moving image, backing off");
                    if let Some((_, best_transform)) = &best {
                        transform = best_transform.clone();
                    }
                    previous = None;
                    unevaluated = false;
                    if relaxation.is_exhausted(learning_rate, starting_rate) {
                        stop = StopCondition::StepTooSmall;
                        break;
                    }
                    continue;
                }
                Err(e) => return Err(e),
            };
            let value = loss.clone().into_scalar().elem::<f64>();
            unevaluated = false;
            tracker.update(
                ProgressInfo::new(level, iteration, Some(self.iterations), value, tracker.elapsed(), learning_rate)
                    .with_parameters(current.clone()),
            );

            if !value.is_finite() {
                tracing::warn!(level, iteration, "metric value is not finite, stopping level");
                stop = StopCondition::NonFiniteValue;
                break;
            }
            history.push(value);
            if improves(&best, value) {
                best = Some((value, transform.clone()));
            }

            let grads = loss.backward();
            let gradient = match params.grad(&grads) {
                Some(g) => to_f64_vec(g)?,
                None => vec![0.0; n],
            };
            let scaled: Vec<f64> = gradient.iter().zip(scales).map(|(g, s)| g / s).collect();

            if iteration == 0 && self.learning_rate_estimation == LearningRateEstimation::Once {
                learning_rate = self.estimate_learning_rate(&transform, &scaled, grid)?;
                starting_rate = learning_rate;
                tracing::debug!(level, learning_rate, "estimated learning rate");
            }

            if let Some((previous_value, previous_gradient)) = &previous {
                if relaxation.overshot(*previous_value, previous_gradient, value, &scaled) {
                    learning_rate = relaxation.relax(learning_rate);
                    tracing::debug!(level, iteration, learning_rate, "relaxed learning rate");
                    if relaxation.is_exhausted(learning_rate, starting_rate) {
                        stop = StopCondition::StepTooSmall;
                        break;
                    }
                }
            }

            let next: Vec<f64> = current.iter().zip(&scaled).map(|(p, g)| p - learning_rate * g).collect();
            if next.iter().any(|p| !p.is_finite()) {
                tracing::warn!(level, iteration, "parameter update is not finite, stopping level");
                stop = StopCondition::NonFiniteUpdate;
                break;
            }
            transform = transform.with_parameters(&next)?;
            unevaluated = true;
            previous = Some((value, scaled));

            if self.convergence.check_convergence(&history) {
                tracing::debug!(level, iteration, "converged");
                stop = StopCondition::Converged;
                break;
            }
        }

        // the last step has not been scored yet
        if unevaluated {
            let params = parameter_tensor::<B>(&transform.parameters(), &device);
            match metric.forward(prepared, &transform, params, &mut *rng) {
                Ok(loss) => {
                    let value = loss.into_scalar().elem::<f64>();
                    if value.is_finite() && improves(&best, value) {
                        best = Some((value, transform.clone()));
                    }
                }
                Err(RegistrationError::NumericalInstability(reason)) => {
                    tracing::debug!(level, %reason, "discarding the last step");
                }
                Err(e) => return Err(e),
            }
        }

        let (final_value, transform) = match best {
            Some((value, best_transform)) => (value, best_transform),
            None => (f64::NAN, transform),
        };
        tracker.complete(level, final_value, learning_rate);
        Ok((
            transform,
            LevelReport {
                level,
                iterations,
                final_value,
                learning_rate,
                stop,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::Autodiff;
    use burn::tensor::backend::Backend;
    use burn_ndarray::NdArray;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use seqalign_core::spatial::{Direction, Point, Point3, Spacing};
    use seqalign_core::transform::Euler3DTransform;
    use seqalign_core::Image;

    type B = Autodiff<NdArray<f32>>;

    /// Squared distance of the translation from a target; ignores the images.
    struct Quadratic {
        target: [f32; 3],
    }

    impl<Bk: Backend> Metric<Bk> for Quadratic {
        type Prepared = ();

        fn prepare(&self, _fixed: &Image<Bk, 3>, _moving: &Image<Bk, 3>) -> Result<()> {
            Ok(())
        }

        fn forward<T: ParametricTransform>(
            &self,
            _prepared: &(),
            _transform: &T,
            parameters: Tensor<Bk, 1>,
            _rng: &mut dyn RngCore,
        ) -> Result<Tensor<Bk, 1>> {
            let device = parameters.device();
            let target = Tensor::<Bk, 1>::from_data(TensorData::new(self.target.to_vec(), [3]), &device);
            let diff = parameters.slice([3..6]) - target;
            Ok((diff.clone() * diff).sum())
        }

        fn device(&self, _prepared: &()) -> Bk::Device {
            Default::default()
        }

        fn name(&self) -> &'static str {
            "Quadratic"
        }
    }

    /// Reports the squared distance to `target` but always the gradient `slope`.
    struct Misleading {
        target: [f32; 3],
        slope: [f32; 3],
    }

    impl<Bk: AutodiffBackend> Metric<Bk> for Misleading {
        type Prepared = ();

        fn prepare(&self, _fixed: &Image<Bk, 3>, _moving: &Image<Bk, 3>) -> Result<()> {
            Ok(())
        }

        fn forward<T: ParametricTransform>(
            &self,
            _prepared: &(),
            _transform: &T,
            parameters: Tensor<Bk, 1>,
            _rng: &mut dyn RngCore,
        ) -> Result<Tensor<Bk, 1>> {
            let device = parameters.device();
            let target = Tensor::<Bk, 1>::from_data(TensorData::new(self.target.to_vec(), [3]), &device);
            let slope = Tensor::<Bk, 1>::from_data(TensorData::new(self.slope.to_vec(), [3]), &device);
            let translation = parameters.slice([3..6]);
            let diff = translation.clone().detach() - target;
            let linear = (translation * slope).sum();
            Ok((diff.clone() * diff).sum() + linear.clone() - linear.detach())
        }

        fn device(&self, _prepared: &()) -> Bk::Device {
            Default::default()
        }

        fn name(&self) -> &'static str {
            "Misleading"
        }
    }

    /// [`Quadratic`] that cannot be evaluated once the x translation exceeds `limit`.
    struct Fenced {
        inner: Quadratic,
        limit: f64,
    }

    impl<Bk: Backend> Metric<Bk> for Fenced {
        type Prepared = ();

        fn prepare(&self, _fixed: &Image<Bk, 3>, _moving: &Image<Bk, 3>) -> Result<()> {
            Ok(())
        }

        fn forward<T: ParametricTransform>(
            &self,
            prepared: &(),
            transform: &T,
            parameters: Tensor<Bk, 1>,
            rng: &mut dyn RngCore,
        ) -> Result<Tensor<Bk, 1>> {
            let tx = transform.parameters()[3];
            if tx.abs() > self.limit {
                return Err(RegistrationError::numerical_instability(format!("tx = {tx}")));
            }
            Metric::<Bk>::forward(&self.inner, prepared, transform, parameters, rng)
        }

        fn device(&self, _prepared: &()) -> Bk::Device {
            Default::default()
        }

        fn name(&self) -> &'static str {
            "Fenced"
        }
    }

    fn grid() -> ImageGrid<3> {
        ImageGrid::new([10, 10, 10], Point::origin(), Spacing::uniform(1.0), Direction::identity())
    }

    fn run(optimizer: &GradientDescentOptimizer) -> (Euler3DTransform, LevelReport) {
        run_with(optimizer, &Quadratic { target: [1.0, -2.0, 0.5] })
    }

    fn run_with<M: Metric<B, Prepared = ()>>(optimizer: &GradientDescentOptimizer, metric: &M) -> (Euler3DTransform, LevelReport) {
        let grid = grid();
        let tracker = ProgressTracker::new(None);
        let mut rng = StdRng::seed_from_u64(0);
        let ctx = LevelContext {
            level: 0,
            grid: &grid,
            scales: &[1.0; 6],
            rng: &mut rng,
            tracker: &tracker,
        };
        optimizer
            .optimize::<B, _, _>(metric, &(), Euler3DTransform::identity(Point3::origin()), ctx)
            .unwrap()
    }

    fn assert_at_target(transform: &Euler3DTransform) {
        let t = transform.translation();
        assert!((t[0] - 1.0).abs() < 1e-3, "{t:?}");
        assert!((t[1] + 2.0).abs() < 1e-3, "{t:?}");
        assert!((t[2] - 0.5).abs() < 1e-3, "{t:?}");
    }

    #[test]
    fn test_descends_to_minimum() {
        let optimizer = GradientDescentOptimizer::new(0.1, 200)
            .unwrap()
            .with_learning_rate_estimation(LearningRateEstimation::Never);
        let (transform, report) = run(&optimizer);
        assert_at_target(&transform);
        assert!(report.final_value < 1e-5);
        assert_eq!(report.learning_rate, 0.1);
    }

    #[test]
    fn test_estimated_first_step_is_bounded_by_spacing() {
        let optimizer = GradientDescentOptimizer::new(1.0, 1).unwrap();
        let (transform, report) = run(&optimizer);
        let t = transform.translation();
        let step = (t[0] * t[0] + t[1] * t[1] + t[2] * t[2]).sqrt();
        assert!((step - 1.0).abs() < 1e-4, "{step}");
        assert_eq!(report.iterations, 1);
        assert_eq!(report.stop, StopCondition::MaximumIterations);
    }

    #[test]
    fn test_converges_before_budget() {
        let optimizer = GradientDescentOptimizer::new(0.25, 1000)
            .unwrap()
            .with_learning_rate_estimation(LearningRateEstimation::Never)
            .with_convergence(ConvergenceChecker::new(1e-6, 10));
        let (_, report) = run(&optimizer);
        assert_eq!(report.stop, StopCondition::Converged);
        assert!(report.iterations < 1000);
    }

    #[test]
    fn test_overshooting_rate_is_relaxed() {
        // at 1.5 every fixed-rate step doubles the error and flips its sign
        let optimizer = GradientDescentOptimizer::new(1.5, 80)
            .unwrap()
            .with_learning_rate_estimation(LearningRateEstimation::Never);
        let (transform, report) = run(&optimizer);
        assert_at_target(&transform);
        assert!(report.final_value < 1e-5);
        assert_eq!(report.learning_rate, 0.375);
    }

    #[test]
    fn test_fixed_rate_without_relaxation_diverges() {
        let optimizer = GradientDescentOptimizer::new(1.5, 10)
            .unwrap()
            .with_learning_rate_estimation(LearningRateEstimation::Never)
            .with_relaxation(StepRelaxation::disabled())
            .unwrap();
        let (transform, report) = run(&optimizer);
        // every later point is worse, so the start is kept
        assert_eq!(transform.translation(), [0.0, 0.0, 0.0]);
        assert_eq!(report.final_value, 5.25);
    }

    #[test]
    fn test_never_returns_worse_than_start() {
        let metric = Misleading {
            target: [1.0, -2.0, 0.5],
            slope: [1.0, -2.0, 0.5],
        };
        // a rising history also reads as converged, so widen the window past the relaxations
        let optimizer = GradientDescentOptimizer::new(1.0, 100)
            .unwrap()
            .with_learning_rate_estimation(LearningRateEstimation::Never)
            .with_convergence(ConvergenceChecker::new(1e-6, 50));
        let (transform, report) = run_with(&optimizer, &metric);
        assert_eq!(transform.translation(), [0.0, 0.0, 0.0]);
        assert_eq!(report.final_value, 5.25);
        assert_eq!(report.stop, StopCondition::StepTooSmall);
        assert!(report.iterations < 100);
    }

    #[test]
    fn test_step_outside_valid_region_backs_off() {
        let metric = Fenced {
            inner: Quadratic { target: [1.0, -2.0, 0.5] },
            limit: 2.5,
        };
        let optimizer = GradientDescentOptimizer::new(1.5, 80)
            .unwrap()
            .with_learning_rate_estimation(LearningRateEstimation::Never);
        let (transform, report) = run_with(&optimizer, &metric);
        assert_at_target(&transform);
        assert_eq!(report.learning_rate, 0.375);
    }

    #[test]
    fn test_negligible_gradient_keeps_configured_rate() {
        let optimizer = GradientDescentOptimizer::new(0.5, 1).unwrap();
        let at_target = Quadratic { target: [0.0, 0.0, 0.0] };
        let (transform, report) = run_with(&optimizer, &at_target);
        assert_eq!(report.learning_rate, 0.5);
        assert_eq!(transform.translation(), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_rejects_scale_count_mismatch() {
        let metric = Quadratic { target: [0.0; 3] };
        let grid = grid();
        let tracker = ProgressTracker::new(None);
        let mut rng = StdRng::seed_from_u64(0);
        let ctx = LevelContext {
            level: 0,
            grid: &grid,
            scales: &[1.0; 3],
            rng: &mut rng,
            tracker: &tracker,
        };
        let err = GradientDescentOptimizer::default()
            .optimize::<B, _, _>(&metric, &(), Euler3DTransform::identity(Point3::origin()), ctx)
            .unwrap_err();
        assert!(matches!(err, RegistrationError::DimensionMismatch(_)));
    }
}
