//! Which fixed-image voxels a metric evaluation looks at.

use crate::error::Result;
use crate::validation::validate_sampling_percentage;
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use rand::{Rng, RngCore};
use seqalign_core::image::generate_index_grid;
use serde::{Deserialize, Serialize};

/// Random sampling never draws fewer voxels than this, unless the image has fewer.
pub const MINIMUM_RANDOM_SAMPLES: usize = 4096;

/// Metric sampling strategy over the fixed image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SamplingStrategy {
    /// Every voxel, every iteration.
    Full,
    /// A fresh uniform draw of `round(percentage * N)` voxels per evaluation,
    /// at least [`MINIMUM_RANDOM_SAMPLES`] and at most `N`, each jittered within
    /// its voxel.
    Random { percentage: f64 },
}

impl Default for SamplingStrategy {
    fn default() -> Self {
        SamplingStrategy::Random { percentage: 0.01 }
    }
}

impl SamplingStrategy {
    pub fn validate(&self) -> Result<()> {
        match self {
            SamplingStrategy::Full => Ok(()),
            SamplingStrategy::Random { percentage } => validate_sampling_percentage(*percentage),
        }
    }

    /// Number of samples drawn from a volume of `total` voxels.
    pub fn sample_count(&self, total: usize) -> usize {
        match self {
            SamplingStrategy::Full => total,
            SamplingStrategy::Random { percentage } => {
                ((percentage * total as f64).round() as usize).max(MINIMUM_RANDOM_SAMPLES).min(total)
            }
        }
    }

    /// Continuous indices `[N, 3]` (x, y, z) of the samples for a `[z, y, x]` shape.
    ///
    /// `Full` returns the voxel centers in memory order; `Random` consumes the
    /// generator and returns jittered positions clamped to the voxel grid.
    pub fn sample_indices<B: Backend>(&self, shape: [usize; 3], rng: &mut dyn RngCore, device: &B::Device) -> Tensor<B, 2> {
        let [d, h, w] = shape;
        let total = d * h * w;
        match self {
            SamplingStrategy::Full => generate_index_grid::<B>(shape, device),
            SamplingStrategy::Random { .. } => {
                let count = self.sample_count(total);
                let limits = [w, h, d].map(|n| n.saturating_sub(1) as f64);
                let mut coords = Vec::with_capacity(count * 3);
                for _ in 0..count {
                    let flat = rng.gen_range(0..total);
                    let voxel = [flat % w, (flat / w) % h, flat / (w * h)];
                    for axis in 0..3 {
                        let jitter = rng.gen::<f64>() - 0.5;
                        let c = (voxel[axis] as f64 + jitter).clamp(0.0, limits[axis]);
                        coords.push(c as f32);
                    }
                }
                Tensor::<B, 1>::from_data(TensorData::new(coords, [count * 3]), device).reshape([count, 3])
            }
        }
    }
}
