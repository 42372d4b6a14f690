use super::downsample::DownsampleFilter;
use super::gaussian::GaussianFilter;
use crate::error::{CoreError, Result};
use crate::image::Image;
use burn::tensor::backend::Backend;

/// Multi-resolution image pyramid.
///
/// Level `i` is the input smoothed with `smoothing_sigmas[i]` (physical units,
/// per axis `(x, y, z)`) and then shrunk by `shrink_factors[i]`. Levels are
/// stored in schedule order, which for registration is coarsest first.
pub struct MultiResolutionPyramid<B: Backend, const D: usize> {
    images: Vec<Image<B, D>>,
}

impl<B: Backend, const D: usize> MultiResolutionPyramid<B, D> {
    /// Build a pyramid from per-level, per-axis schedules.
    ///
    /// Each inner vector may hold one value per axis or a single value for all axes.
    pub fn new(input: &Image<B, D>, shrink_factors: &[Vec<usize>], smoothing_sigmas: &[Vec<f64>]) -> Result<Self> {
        if shrink_factors.len() != smoothing_sigmas.len() {
            return Err(CoreError::invalid_parameter(
                "smoothing_sigmas",
                format!(
                    "{} smoothing levels for {} shrink levels",
                    smoothing_sigmas.len(),
                    shrink_factors.len()
                ),
            ));
        }
        if shrink_factors.iter().flatten().any(|&f| f == 0) {
            return Err(CoreError::invalid_parameter("shrink_factors", "factors must be at least 1"));
        }
        if smoothing_sigmas.iter().flatten().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(CoreError::invalid_parameter("smoothing_sigmas", "sigmas must be finite and non-negative"));
        }

        let images = shrink_factors
            .iter()
            .zip(smoothing_sigmas.iter())
            .map(|(factors, sigmas)| {
                let is_identity_shrink = factors.iter().all(|&f| f == 1);
                let is_identity_smooth = sigmas.iter().all(|&s| s <= 1e-6);

                let smoothed = if is_identity_smooth {
                    input.clone()
                } else {
                    GaussianFilter::new(sigmas.clone()).apply(input)
                };

                if is_identity_shrink {
                    smoothed
                } else {
                    DownsampleFilter::new(factors.clone()).apply(&smoothed)
                }
            })
            .collect();

        Ok(Self { images })
    }

    /// Build a pyramid from one isotropic factor and sigma per level.
    ///
    /// With `sigmas_in_physical_units == false` the sigmas are voxel counts and
    /// are converted with the input spacing of each axis.
    pub fn from_schedule(
        input: &Image<B, D>,
        shrink_factors: &[usize],
        smoothing_sigmas: &[f64],
        sigmas_in_physical_units: bool,
    ) -> Result<Self> {
        let factors: Vec<Vec<usize>> = shrink_factors.iter().map(|&f| vec![f]).collect();
        let sigmas: Vec<Vec<f64>> = smoothing_sigmas
            .iter()
            .map(|&s| {
                if sigmas_in_physical_units {
                    vec![s]
                } else {
                    (0..D).map(|axis| s * input.spacing()[axis]).collect()
                }
            })
            .collect();
        Self::new(input, &factors, &sigmas)
    }

    pub fn get_level(&self, level: usize) -> Option<&Image<B, D>> {
        self.images.get(level)
    }

    pub fn levels(&self) -> usize {
        self.images.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Image<B, D>> {
        self.images.iter()
    }
}

/// Power-of-two schedule for `levels` levels, coarsest first.
///
/// `levels = 3` gives factors `[4, 2, 1]` and sigmas `[2.0, 1.0, 0.0]`.
pub fn default_schedule(levels: usize) -> (Vec<usize>, Vec<f64>) {
    (0..levels)
        .map(|i| {
            let factor = 1usize << (levels - 1 - i);
            let sigma = if factor > 1 { 0.5 * factor as f64 } else { 0.0 };
            (factor, sigma)
        })
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{Direction, Point, Spacing};
    use burn::tensor::Tensor;
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    fn volume() -> Image<B, 3> {
        let device = Default::default();
        Image::new(
            Tensor::<B, 3>::ones([8, 16, 16], &device),
            Point::origin(),
            Spacing::new([1.0, 1.0, 2.0]),
            Direction::identity(),
        )
    }

    #[test]
    fn test_default_schedule() {
        let (factors, sigmas) = default_schedule(3);
        assert_eq!(factors, vec![4, 2, 1]);
        assert_eq!(sigmas, vec![2.0, 1.0, 0.0]);
    }

    #[test]
    fn test_levels_coarsest_first() {
        let image = volume();
        let pyramid = MultiResolutionPyramid::from_schedule(&image, &[4, 2, 1], &[2.0, 1.0, 0.0], true).unwrap();
        assert_eq!(pyramid.levels(), 3);
        assert_eq!(pyramid.get_level(0).unwrap().size(), [4, 4, 2]);
        assert_eq!(pyramid.get_level(1).unwrap().size(), [8, 8, 4]);
        assert_eq!(pyramid.get_level(2).unwrap().size(), [16, 16, 8]);
        assert!(pyramid.get_level(3).is_none());
    }

    #[test]
    fn test_smoothing_preserves_constant() {
        let image = volume();
        let pyramid = MultiResolutionPyramid::from_schedule(&image, &[2], &[1.5], true).unwrap();
        let values = pyramid.get_level(0).unwrap().to_vec();
        assert!(values.iter().all(|v| (v - 1.0).abs() < 1e-4));
    }

    #[test]
    fn test_mismatched_schedule_is_rejected() {
        let image = volume();
        let result = MultiResolutionPyramid::new(&image, &[vec![2], vec![1]], &[vec![1.0]]);
        assert!(matches!(result, Err(CoreError::InvalidParameter { .. })));
    }
}
