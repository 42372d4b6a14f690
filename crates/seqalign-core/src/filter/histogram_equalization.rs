//! Adaptive (local power-law) histogram equalization.
//!
//! Each voxel is mapped through the cumulative function of its box
//! neighborhood. `alpha` blends between classical equalization (`alpha = 0`)
//! and the identity (`alpha = 1`); `beta` blends between an unsharp mask
//! (`beta = 0`) and the identity (`beta = 1`). Intensities are normalized to
//! `[-0.5, 0.5]` with the global min/max and mapped back afterwards.

use crate::error::{CoreError, Result};
use crate::image::Image;
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use ndarray::{Array3, Zip};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveHistogramEqualizationFilter {
    pub alpha: f64,
    pub beta: f64,
    /// Neighborhood half-width in voxels, `(x, y, z)`.
    pub radius: [usize; 3],
}

impl Default for AdaptiveHistogramEqualizationFilter {
    fn default() -> Self {
        Self {
            alpha: 0.3,
            beta: 0.3,
            radius: [5, 5, 5],
        }
    }
}

impl AdaptiveHistogramEqualizationFilter {
    pub fn new(alpha: f64, beta: f64) -> Self {
        Self {
            alpha,
            beta,
            ..Self::default()
        }
    }

    pub fn with_radius(mut self, radius: [usize; 3]) -> Self {
        self.radius = radius;
        self
    }

    pub fn apply<B: Backend>(&self, image: &Image<B, 3>) -> Result<Image<B, 3>> {
        let shape = image.shape();
        let device = image.data().device();
        let values = image
            .data()
            .clone()
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| CoreError::invalid_parameter("image", format!("voxel data is not readable as f32: {:?}", e)))?;
        let volume = Array3::from_shape_vec((shape[0], shape[1], shape[2]), values)
            .map_err(|e| CoreError::invalid_parameter("image", e.to_string()))?;

        let equalized = self.equalize(&volume);
        let data = Tensor::<B, 1>::from_data(TensorData::new(equalized.into_raw_vec(), [shape.iter().product::<usize>()]), &device)
            .reshape(shape);
        Ok(Image::new(data, *image.origin(), *image.spacing(), *image.direction()))
    }

    /// Equalize a `[z, y, x]` volume. Neighborhoods are clamped at the borders.
    pub fn equalize(&self, volume: &Array3<f32>) -> Array3<f32> {
        let Some((min, max)) = finite_range(volume.iter().copied()) else {
            return volume.clone();
        };
        let range = (max - min) as f64;
        if range <= 0.0 {
            return volume.clone();
        }

        let normalized = volume.mapv(|v| (v - min) as f64 / range - 0.5);
        let (d, h, w) = normalized.dim();
        let [rx, ry, rz] = self.radius;
        let kernel_norm = 1.0 / ((2 * rx + 1) * (2 * ry + 1) * (2 * rz + 1)) as f64;

        let mut out = Array3::<f32>::zeros((d, h, w));
        Zip::indexed(&mut out).par_for_each(|(z, y, x), o| {
            let u = normalized[[z, y, x]];
            let mut sum = 0.0;
            for dz in -(rz as isize)..=(rz as isize) {
                let zz = clamp_index(z, dz, d);
                for dy in -(ry as isize)..=(ry as isize) {
                    let yy = clamp_index(y, dy, h);
                    for dx in -(rx as isize)..=(rx as isize) {
                        let xx = clamp_index(x, dx, w);
                        sum += self.cumulative(u, normalized[[zz, yy, xx]]);
                    }
                }
            }
            *o = (range * (sum * kernel_norm + 0.5) + min as f64) as f32;
        });
        out
    }

    fn cumulative(&self, u: f64, v: f64) -> f64 {
        let diff = u - v;
        let s = if diff > 0.0 {
            1.0
        } else if diff < 0.0 {
            -1.0
        } else {
            0.0
        };
        let ad = (2.0 * diff).abs();
        0.5 * s * ad.powf(self.alpha) - self.beta * 0.5 * s * ad + self.beta * u
    }
}

fn clamp_index(i: usize, offset: isize, n: usize) -> usize {
    (i as isize + offset).clamp(0, n as isize - 1) as usize
}

fn finite_range(values: impl Iterator<Item = f32>) -> Option<(f32, f32)> {
    values.filter(|v| v.is_finite()).fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{Direction, Point, Spacing};
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    fn ramp() -> Array3<f32> {
        Array3::from_shape_fn((4, 6, 8), |(z, y, x)| (x + 2 * y + 3 * z) as f32)
    }

    #[test]
    fn test_unit_parameters_are_identity() {
        let volume = ramp();
        let out = AdaptiveHistogramEqualizationFilter::new(1.0, 1.0)
            .with_radius([2, 2, 1])
            .equalize(&volume);
        for (a, b) in out.iter().zip(volume.iter()) {
            assert!((a - b).abs() < 1e-3, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_constant_volume_is_unchanged() {
        let volume = Array3::from_elem((3, 3, 3), 4.0f32);
        let out = AdaptiveHistogramEqualizationFilter::default().equalize(&volume);
        assert_eq!(out, volume);
    }

    #[test]
    fn test_classical_equalization_of_a_step() {
        let volume = Array3::from_shape_fn((1, 1, 32), |(_, _, x)| if x < 16 { 0.0f32 } else { 1.0 });
        let out = AdaptiveHistogramEqualizationFilter::new(0.0, 0.0)
            .with_radius([3, 0, 0])
            .equalize(&volume);
        // flat neighborhoods land mid-range, the edge is stretched apart
        assert!((out[[0, 0, 5]] - 0.5).abs() < 1e-6);
        assert!((out[[0, 0, 26]] - 0.5).abs() < 1e-6);
        assert!(out[[0, 0, 15]] < 0.5);
        assert!(out[[0, 0, 16]] > 0.5);
    }

    #[test]
    fn test_apply_keeps_geometry() {
        let device = Default::default();
        let data = Tensor::<B, 3>::from_data(TensorData::new(ramp().into_raw_vec(), [4, 6, 8]), &device);
        let image = Image::new(data, Point::new([1.0, 2.0, 3.0]), Spacing::new([0.5, 0.5, 2.0]), Direction::identity());
        let out = AdaptiveHistogramEqualizationFilter::new(0.9, 0.9)
            .with_radius([1, 1, 1])
            .apply(&image)
            .unwrap();
        assert_eq!(out.grid(), image.grid());
    }
}
