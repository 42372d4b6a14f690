//! Coarse-to-fine registration over an image pyramid.

use crate::error::{RegistrationError, Result};
use crate::metric::Metric;
use crate::optimizer::{GradientDescentOptimizer, LevelContext, LevelReport, PhysicalShiftScalesEstimator, ScalesMode};
use crate::progress::ProgressTracker;
use burn::tensor::backend::AutodiffBackend;
use rand::RngCore;
use seqalign_core::filter::{default_schedule, MultiResolutionPyramid};
use seqalign_core::transform::ParametricTransform;
use seqalign_core::Image;
use serde::{Deserialize, Serialize};

/// Shrink factors and smoothing sigmas per pyramid level, coarsest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationSchedule {
    pub shrink_factors: Vec<usize>,
    pub smoothing_sigmas: Vec<f64>,
    /// Sigmas are millimetres when true, voxels otherwise.
    pub sigmas_in_physical_units: bool,
}

impl Default for RegistrationSchedule {
    fn default() -> Self {
        Self {
            shrink_factors: vec![4, 2, 1],
            smoothing_sigmas: vec![2.0, 1.0, 0.0],
            sigmas_in_physical_units: true,
        }
    }
}

impl RegistrationSchedule {
    pub fn new(shrink_factors: Vec<usize>, smoothing_sigmas: Vec<f64>) -> Self {
        Self {
            shrink_factors,
            smoothing_sigmas,
            sigmas_in_physical_units: true,
        }
    }

    /// Power-of-two schedule with `levels` levels.
    pub fn power_of_two(levels: usize) -> Self {
        let (shrink_factors, smoothing_sigmas) = default_schedule(levels);
        Self::new(shrink_factors, smoothing_sigmas)
    }

    pub fn with_sigmas_in_physical_units(mut self, physical: bool) -> Self {
        self.sigmas_in_physical_units = physical;
        self
    }

    pub fn levels(&self) -> usize {
        self.shrink_factors.len()
    }

    pub fn validate(&self) -> Result<()> {
        if self.shrink_factors.is_empty() {
            return Err(RegistrationError::invalid_configuration("schedule has no levels"));
        }
        if self.shrink_factors.len() != self.smoothing_sigmas.len() {
            return Err(RegistrationError::invalid_configuration(format!(
                "{} shrink factors but {} smoothing sigmas",
                self.shrink_factors.len(),
                self.smoothing_sigmas.len()
            )));
        }
        if self.shrink_factors.contains(&0) {
            return Err(RegistrationError::invalid_configuration("shrink factors must be at least 1"));
        }
        if self.smoothing_sigmas.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(RegistrationError::invalid_configuration(
                "smoothing sigmas must be finite and non-negative",
            ));
        }
        Ok(())
    }

    fn pyramid<B: AutodiffBackend>(&self, image: &Image<B, 3>) -> Result<MultiResolutionPyramid<B, 3>> {
        Ok(MultiResolutionPyramid::from_schedule(
            image,
            &self.shrink_factors,
            &self.smoothing_sigmas,
            self.sigmas_in_physical_units,
        )?)
    }
}

/// Multi-resolution registration framework.
///
/// Both images are smoothed and shrunk per level; the optimizer runs on each
/// level in turn, coarsest first, and every level starts from the parameters
/// the previous one ended with.
pub struct MultiResolutionRegistration<M> {
    metric: M,
    optimizer: GradientDescentOptimizer,
    schedule: RegistrationSchedule,
    scales: ScalesMode,
}

impl<M> MultiResolutionRegistration<M> {
    pub fn new(metric: M, optimizer: GradientDescentOptimizer, schedule: RegistrationSchedule) -> Self {
        Self {
            metric,
            optimizer,
            schedule,
            scales: ScalesMode::PhysicalShift,
        }
    }

    pub fn with_scales(mut self, scales: ScalesMode) -> Self {
        self.scales = scales;
        self
    }

    pub fn schedule(&self) -> &RegistrationSchedule {
        &self.schedule
    }

    /// Run every level and return the final transform with one report per level.
    pub fn execute<B, T>(
        &self,
        fixed: &Image<B, 3>,
        moving: &Image<B, 3>,
        mut transform: T,
        rng: &mut dyn RngCore,
        tracker: &ProgressTracker<'_>,
    ) -> Result<(T, Vec<LevelReport>)>
    where
        B: AutodiffBackend,
        M: Metric<B>,
        T: ParametricTransform,
    {
        self.schedule.validate()?;
        let fixed_pyramid = self.schedule.pyramid(fixed)?;
        let moving_pyramid = self.schedule.pyramid(moving)?;
        let levels = self.schedule.levels();
        let mut reports = Vec::with_capacity(levels);

        for level in 0..levels {
            let (Some(fixed_level), Some(moving_level)) = (fixed_pyramid.get_level(level), moving_pyramid.get_level(level))
            else {
                return Err(RegistrationError::dimension_mismatch(format!("pyramid has no level {level}")));
            };

            tracing::info!(
                "Starting level {}/{} ({}): fixed {:?}, moving {:?}",
                level + 1,
                levels,
                self.metric.name(),
                fixed_level.size(),
                moving_level.size()
            );

            let grid = fixed_level.grid();
            let scales = match self.scales {
                ScalesMode::PhysicalShift => PhysicalShiftScalesEstimator::default().estimate(&transform, &grid)?,
                ScalesMode::Identity => vec![1.0; transform.number_of_parameters()],
            };
            tracing::debug!(level, ?scales, "parameter scales");

            let prepared = self.metric.prepare(fixed_level, moving_level)?;
            let ctx = LevelContext {
                level,
                grid: &grid,
                scales: &scales,
                rng: &mut *rng,
                tracker,
            };
            let (next, report) = self.optimizer.optimize::<B, M, T>(&self.metric, &prepared, transform, ctx)?;
            transform = next;

            tracing::info!(
                "Finished level {}/{} after {} iterations: metric {:.6} ({:?})",
                level + 1,
                levels,
                report.iterations,
                report.final_value,
                report.stop
            );
            reports.push(report);
        }

        Ok((transform, reports))
    }
}
