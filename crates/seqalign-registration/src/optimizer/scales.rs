//! Parameter scales from physical shifts.
//!
//! Rotation angles and translations live on very different scales: a change of
//! 0.01 rad moves a corner of a 200 mm field of view by about 2 mm, while a
//! translation change of 0.01 moves it by 0.01 mm. Scaling the gradient by the
//! squared shift per unit parameter change balances the two.

use crate::error::Result;
use seqalign_core::spatial::Point3;
use seqalign_core::transform::ParametricTransform;
use seqalign_core::ImageGrid;
use serde::{Deserialize, Serialize};

/// How per-parameter gradient scales are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalesMode {
    /// Estimated from the physical shift of the fixed-grid corners.
    #[default]
    PhysicalShift,
    /// All ones.
    Identity,
}

/// Estimates parameter scales by perturbing each parameter and measuring how
/// far the corners of the fixed grid move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalShiftScalesEstimator {
    /// Parameter perturbation.
    pub delta: f64,
}

impl Default for PhysicalShiftScalesEstimator {
    fn default() -> Self {
        Self { delta: 0.01 }
    }
}

fn max_shift<T: ParametricTransform>(before: &T, after: &T, points: &[Point3]) -> f64 {
    points
        .iter()
        .map(|p| before.transform_point(p).distance(&after.transform_point(p)))
        .fold(0.0, f64::max)
}

impl PhysicalShiftScalesEstimator {
    pub fn new(delta: f64) -> Self {
        Self { delta }
    }

    /// One scale per parameter, `(shift / delta)^2`.
    ///
    /// A parameter that moves nothing gets a scale of 1.
    pub fn estimate<T: ParametricTransform>(&self, transform: &T, grid: &ImageGrid<3>) -> Result<Vec<f64>> {
        let corners = grid.corner_points();
        let base = transform.parameters();
        let mut scales = Vec::with_capacity(base.len());
        for i in 0..base.len() {
            let mut perturbed = base.clone();
            perturbed[i] += self.delta;
            let moved = transform.with_parameters(&perturbed)?;
            let ratio = max_shift(transform, &moved, &corners) / self.delta;
            let scale = ratio * ratio;
            scales.push(if scale > f64::EPSILON { scale } else { 1.0 });
        }
        Ok(scales)
    }

    /// Largest corner displacement caused by adding `step` to the parameters.
    pub fn step_shift<T: ParametricTransform>(&self, transform: &T, step: &[f64], grid: &ImageGrid<3>) -> Result<f64> {
        let stepped: Vec<f64> = transform.parameters().iter().zip(step).map(|(p, s)| p + s).collect();
        let moved = transform.with_parameters(&stepped)?;
        Ok(max_shift(transform, &moved, &grid.corner_points()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqalign_core::spatial::{Direction, Point, Spacing};
    use seqalign_core::transform::Euler3DTransform;

    fn grid() -> ImageGrid<3> {
        ImageGrid::new([101, 101, 101], Point::origin(), Spacing::uniform(1.0), Direction::identity())
    }

    #[test]
    fn test_translation_scales_are_unit() {
        let transform = Euler3DTransform::identity(Point3::new([50.0, 50.0, 50.0]));
        let scales = PhysicalShiftScalesEstimator::default().estimate(&transform, &grid()).unwrap();
        assert_eq!(scales.len(), 6);
        for s in &scales[3..] {
            assert!((s - 1.0).abs() < 1e-6, "{s}");
        }
    }

    #[test]
    fn test_rotation_scales_follow_lever_arm() {
        let transform = Euler3DTransform::identity(Point3::new([50.0, 50.0, 50.0]));
        let scales = PhysicalShiftScalesEstimator::default().estimate(&transform, &grid()).unwrap();
        // corners sit sqrt(2) * 50 from each rotation axis
        let expected = 2.0 * 50.0 * 50.0;
        for s in &scales[..3] {
            assert!((s - expected).abs() / expected < 1e-2, "{s}");
        }
    }

    #[test]
    fn test_step_shift_of_translation() {
        let transform = Euler3DTransform::identity(Point3::origin());
        let shift = PhysicalShiftScalesEstimator::default()
            .step_shift(&transform, &[0.0, 0.0, 0.0, 3.0, 4.0, 0.0], &grid())
            .unwrap();
        assert!((shift - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_mode_serde() {
        let mode: ScalesMode = serde_json::from_str(r#""physical_shift""#).unwrap();
        assert_eq!(mode, ScalesMode::PhysicalShift);
        assert_eq!(serde_json::to_string(&ScalesMode::Identity).unwrap(), r#""identity""#);
    }
}
