//! Radial (barrel/pincushion) distortion fields.

use crate::error::Result;
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use rand::RngCore;
use seqalign_core::geometry::{random_radial_distortion_coefficients, RadialDistortionRanges};
use seqalign_core::spatial::Point3;
use seqalign_core::transform::DisplacementFieldTransform;
use seqalign_core::Image;

/// Polynomial coefficients of the radial factor `k1 r² + k2 r⁴ + k3 r⁶`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadialCoefficients {
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
}

impl RadialCoefficients {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(k1: f64, k2: f64, k3: f64) -> Self {
        Self { k1, k2, k3 }
    }

    pub fn sample(ranges: &RadialDistortionRanges, rng: &mut dyn RngCore) -> Self {
        let (k1, k2, k3) = random_radial_distortion_coefficients(ranges, rng);
        Self::new(k1, k2, k3)
    }

    /// Scalar factor at squared radius `r2`.
    pub fn factor(&self, r2: f64) -> f64 {
        self.k1 * r2 + self.k2 * r2 * r2 + self.k3 * r2 * r2 * r2
    }
}

/// Displacement field on `volume`'s grid where every voxel at `p` moves by
/// `f(|p - c|²) · (p - c)`.
///
/// `center` defaults to the volume's physical center. All voxels are
/// evaluated in one tensor pass.
pub fn radial_distortion_transform<B: Backend>(
    volume: &Image<B, 3>,
    center: Option<Point3>,
    coefficients: RadialCoefficients,
) -> Result<DisplacementFieldTransform<B>> {
    let grid = volume.grid();
    let device = volume.data().device();
    let center = center.unwrap_or_else(|| volume.physical_center());
    let [d, h, w] = grid.shape();

    let c: Vec<f32> = center.to_array().iter().map(|&v| v as f32).collect();
    let c = Tensor::<B, 2>::from_data(TensorData::new(c, [1, 3]), &device);
    let offsets = grid.physical_points::<B>(&device) - c;

    let r2 = offsets.clone().powf_scalar(2.0).sum_dim(1);
    let r4 = r2.clone() * r2.clone();
    let r6 = r4.clone() * r2.clone();
    let factor = r2 * coefficients.k1 + r4 * coefficients.k2 + r6 * coefficients.k3;

    let field = (offsets * factor).swap_dims(0, 1).reshape([3, d, h, w]);
    tracing::debug!(
        k1 = coefficients.k1,
        k2 = coefficients.k2,
        k3 = coefficients.k3,
        center = ?center.to_array(),
        "radial distortion field"
    );
    Ok(DisplacementFieldTransform::new(field, grid)?)
}

/// [`radial_distortion_transform`] with coefficients drawn from `ranges`.
pub fn random_radial_distortion_transform<B: Backend>(
    volume: &Image<B, 3>,
    center: Option<Point3>,
    ranges: &RadialDistortionRanges,
    rng: &mut dyn RngCore,
) -> Result<DisplacementFieldTransform<B>> {
    radial_distortion_transform(volume, center, RadialCoefficients::sample(ranges, rng))
}
