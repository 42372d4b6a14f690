//! Stochastic intensity augmentation.

use crate::error::{AugmentError, Result};
use burn::tensor::backend::Backend;
use rand::RngCore;
use seqalign_core::filter::{AdaptiveHistogramEqualizationFilter, AdditiveGaussianNoiseFilter};
use seqalign_core::geometry::Interval;
use seqalign_core::Image;
use serde::{Deserialize, Serialize};

/// Sampling ranges of the intensity filters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntensityAugmentationRanges {
    /// Standard deviation of the additive noise.
    pub noise_standard_deviation: Interval,
    pub alpha: Interval,
    pub beta: Interval,
    /// Equalization neighborhood radius in voxels, `(x, y, z)`.
    pub radius: [usize; 3],
}

impl Default for IntensityAugmentationRanges {
    fn default() -> Self {
        Self {
            noise_standard_deviation: Interval::new(0.0, 0.1),
            alpha: Interval::new(0.7, 1.0),
            beta: Interval::new(0.7, 1.0),
            radius: [5, 5, 5],
        }
    }
}

impl IntensityAugmentationRanges {
    pub fn with_noise_standard_deviation(mut self, range: Interval) -> Self {
        self.noise_standard_deviation = range;
        self
    }

    pub fn with_alpha(mut self, range: Interval) -> Self {
        self.alpha = range;
        self
    }

    pub fn with_beta(mut self, range: Interval) -> Self {
        self.beta = range;
        self
    }

    pub fn with_radius(mut self, radius: [usize; 3]) -> Self {
        self.radius = radius;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let sigma = self.noise_standard_deviation;
        if !(sigma.min.is_finite() && sigma.max.is_finite()) || sigma.min < 0.0 || sigma.max < sigma.min {
            return Err(AugmentError::invalid_range(
                "noise_standard_deviation",
                format!("expected 0 <= min <= max, got [{}, {}]", sigma.min, sigma.max),
            ));
        }
        for (name, range) in [("alpha", self.alpha), ("beta", self.beta)] {
            if !(range.min.is_finite() && range.max.is_finite()) || range.max < range.min {
                return Err(AugmentError::invalid_range(
                    name,
                    format!("expected finite min <= max, got [{}, {}]", range.min, range.max),
                ));
            }
        }
        Ok(())
    }
}

/// Additive noise followed by adaptive histogram equalization, with fresh
/// parameters drawn for every volume.
pub fn augment_intensity<B: Backend>(
    volumes: &[Image<B, 3>],
    ranges: &IntensityAugmentationRanges,
    rng: &mut dyn RngCore,
) -> Result<Vec<Image<B, 3>>> {
    ranges.validate()?;
    volumes
        .iter()
        .enumerate()
        .map(|(i, volume)| -> Result<Image<B, 3>> {
            let sigma = ranges.noise_standard_deviation.sample(&mut *rng);
            let alpha = ranges.alpha.sample(&mut *rng);
            let beta = ranges.beta.sample(&mut *rng);
            tracing::debug!(volume = i, sigma, alpha, beta, "intensity augmentation");

            let noisy = AdditiveGaussianNoiseFilter::new(sigma).apply(volume, &mut *rng)?;
            let equalized = AdaptiveHistogramEqualizationFilter::new(alpha, beta)
                .with_radius(ranges.radius)
                .apply(&noisy)?;
            Ok(equalized)
        })
        .collect()
}
