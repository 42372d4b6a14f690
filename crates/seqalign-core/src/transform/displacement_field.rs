//! Dense displacement field transform.

use super::trait_::Transform;
use crate::error::{CoreError, Result};
use crate::image::ImageGrid;
use crate::interpolation::{inside_mask, Interpolator, LinearInterpolator};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// `T(x) = x + u(x)` where `u` is a vector field sampled on a voxel grid.
///
/// The field tensor is `[3, z, y, x]`; channel `k` holds the physical
/// displacement along axis `k` (x, y, z order). Between voxels the field is
/// trilinearly interpolated; outside the grid the displacement is zero.
#[derive(Debug, Clone)]
pub struct DisplacementFieldTransform<B: Backend> {
    field: Tensor<B, 4>,
    grid: ImageGrid<3>,
}

impl<B: Backend> DisplacementFieldTransform<B> {
    /// The field's voxel shape must equal the grid's exactly.
    pub fn new(field: Tensor<B, 4>, grid: ImageGrid<3>) -> Result<Self> {
        let [d, h, w] = grid.shape();
        let actual = field.dims();
        if actual != [3, d, h, w] {
            return Err(CoreError::shape_mismatch(&[3, d, h, w], &actual));
        }
        Ok(Self { field, grid })
    }

    pub fn zeros(grid: ImageGrid<3>, device: &B::Device) -> Self {
        let [d, h, w] = grid.shape();
        Self {
            field: Tensor::zeros([3, d, h, w], device),
            grid,
        }
    }

    pub fn field(&self) -> &Tensor<B, 4> {
        &self.field
    }

    pub fn grid(&self) -> &ImageGrid<3> {
        &self.grid
    }

    /// Displacement along one physical axis as a `[z, y, x]` volume.
    pub fn component(&self, axis: usize) -> Tensor<B, 3> {
        self.field.clone().narrow(0, axis, 1).reshape(self.grid.shape())
    }

    /// Largest displacement magnitude over the grid.
    pub fn max_norm(&self) -> f64 {
        let norms = self.field.clone().powf_scalar(2.0).sum_dim(0).sqrt().max();
        norms.into_data().convert::<f64>().to_vec::<f64>().ok().and_then(|v| v.first().copied()).unwrap_or(0.0)
    }
}

impl<B: Backend> Transform<B, 3> for DisplacementFieldTransform<B> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let shape = self.grid.shape();
        let indices = self.grid.world_to_index_tensor(points.clone());
        let mask = inside_mask(indices.clone(), shape, 0.0);

        let displacement: Vec<Tensor<B, 1>> = (0..3)
            .map(|axis| LinearInterpolator.interpolate(&self.component(axis), indices.clone()) * mask.clone())
            .collect();
        points + Tensor::stack::<2>(displacement, 1)
    }
}
