//! Additive Gaussian noise.

use crate::error::{CoreError, Result};
use crate::image::Image;
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use rand::RngCore;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Adds i.i.d. normal noise to every voxel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdditiveGaussianNoiseFilter {
    pub mean: f64,
    pub standard_deviation: f64,
}

impl Default for AdditiveGaussianNoiseFilter {
    fn default() -> Self {
        Self {
            mean: 0.0,
            standard_deviation: 1.0,
        }
    }
}

impl AdditiveGaussianNoiseFilter {
    pub fn new(standard_deviation: f64) -> Self {
        Self {
            standard_deviation,
            ..Self::default()
        }
    }

    pub fn with_mean(mut self, mean: f64) -> Self {
        self.mean = mean;
        self
    }

    pub fn apply<B: Backend, const D: usize>(&self, image: &Image<B, D>, rng: &mut dyn RngCore) -> Result<Image<B, D>> {
        if !(self.standard_deviation.is_finite() && self.standard_deviation >= 0.0) {
            return Err(CoreError::invalid_parameter(
                "standard_deviation",
                format!("must be finite and non-negative, got {}", self.standard_deviation),
            ));
        }
        let normal = Normal::new(self.mean, self.standard_deviation).map_err(|e| {
            CoreError::invalid_parameter("standard_deviation", format!("{} ({})", e, self.standard_deviation))
        })?;

        let data = image.data();
        let shape = data.dims();
        let device = data.device();
        let mut values = data.clone().into_data().convert::<f32>().to_vec::<f32>().map_err(|e| {
            CoreError::invalid_parameter("image", format!("voxel data is not readable as f32: {:?}", e))
        })?;

        for v in values.iter_mut() {
            *v += normal.sample(&mut *rng) as f32;
        }

        let noisy = Tensor::<B, D>::from_data(TensorData::new(values, shape), &device);
        Ok(Image::new(noisy, *image.origin(), *image.spacing(), *image.direction()))
    }
}
