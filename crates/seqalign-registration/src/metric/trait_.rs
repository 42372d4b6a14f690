//! Metric trait for image similarity measurement.

use crate::error::Result;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rand::RngCore;
use seqalign_core::transform::ParametricTransform;
use seqalign_core::Image;

/// Similarity between a fixed image and a moving image seen through a transform.
///
/// Lower values mean better alignment. Work that depends only on the two
/// images (intensity ranges, interpolation coefficients) happens once per
/// pyramid level in `prepare`; `forward` then runs every iteration with the
/// parameters as a tensor so the backend can differentiate through it.
pub trait Metric<B: Backend> {
    /// Per-level state built from the fixed and moving images.
    type Prepared;

    fn prepare(&self, fixed: &Image<B, 3>, moving: &Image<B, 3>) -> Result<Self::Prepared>;

    /// Metric value `[1]` at `parameters`, evaluated through `transform`'s parameterization.
    fn forward<T: ParametricTransform>(
        &self,
        prepared: &Self::Prepared,
        transform: &T,
        parameters: Tensor<B, 1>,
        rng: &mut dyn RngCore,
    ) -> Result<Tensor<B, 1>>;

    /// Device the prepared level lives on; optimizer parameters are created there.
    fn device(&self, prepared: &Self::Prepared) -> B::Device;

    fn name(&self) -> &'static str;
}
