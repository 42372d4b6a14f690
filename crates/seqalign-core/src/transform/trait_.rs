//! Transform traits.

use crate::error::Result;
use crate::spatial::Point3;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Maps points from output (fixed) physical space to input (moving) physical space.
///
/// Resampling walks the output grid, pushes each voxel position through the
/// transform and samples the input image there.
pub trait Transform<B: Backend, const D: usize> {
    /// Apply the transform to a `[N, D]` batch of physical points.
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2>;
}

/// A 3D transform described by a flat parameter vector about a fixed center.
///
/// This is what the optimizer sees: parameters are read, perturbed and written
/// back as `f64`, while `transform_points_with` evaluates the transform from a
/// parameter tensor so gradients can flow to the parameters.
pub trait ParametricTransform: Clone + std::fmt::Debug + Send + Sync {
    fn number_of_parameters(&self) -> usize;

    fn parameters(&self) -> Vec<f64>;

    /// A copy of this transform with new parameters; the center is kept.
    fn with_parameters(&self, parameters: &[f64]) -> Result<Self>;

    fn center(&self) -> Point3;

    /// Map a single point on the CPU in double precision.
    fn transform_point(&self, point: &Point3) -> Point3;

    /// Map a `[N, 3]` batch using `parameters` (shape `[P]`) in place of the stored ones.
    fn transform_points_with<B: Backend>(&self, parameters: Tensor<B, 1>, points: Tensor<B, 2>) -> Tensor<B, 2>;
}

impl<B: Backend, const D: usize, T: Transform<B, D> + ?Sized> Transform<B, D> for &T {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        (**self).transform_points(points)
    }
}
