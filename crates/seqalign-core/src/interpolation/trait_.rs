//! Interpolator trait and the configurable interpolation kind.

use super::{BSplineInterpolator, LinearInterpolator};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

/// Samples a `[z, y, x]` volume at continuous indices.
///
/// Indices are an `[N, 3]` tensor of `(x, y, z)` rows. Interpolators that need
/// a transformed representation of the voxels (spline coefficients) compute it
/// in `prepare`, so callers that sample the same volume many times can prepare
/// it once and call `interpolate_prepared`.
pub trait Interpolator<B: Backend> {
    fn prepare(&self, data: &Tensor<B, 3>) -> Tensor<B, 3> {
        data.clone()
    }

    fn interpolate_prepared(&self, prepared: &Tensor<B, 3>, indices: Tensor<B, 2>) -> Tensor<B, 1>;

    fn interpolate(&self, data: &Tensor<B, 3>, indices: Tensor<B, 2>) -> Tensor<B, 1> {
        self.interpolate_prepared(&self.prepare(data), indices)
    }
}

/// Interpolation kind selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    Linear,
    #[default]
    BSpline,
}

impl<B: Backend> Interpolator<B> for Interpolation {
    fn prepare(&self, data: &Tensor<B, 3>) -> Tensor<B, 3> {
        match self {
            Interpolation::Linear => <LinearInterpolator as Interpolator<B>>::prepare(&LinearInterpolator, data),
            Interpolation::BSpline => {
                <BSplineInterpolator as Interpolator<B>>::prepare(&BSplineInterpolator, data)
            }
        }
    }

    fn interpolate_prepared(&self, prepared: &Tensor<B, 3>, indices: Tensor<B, 2>) -> Tensor<B, 1> {
        match self {
            Interpolation::Linear => LinearInterpolator.interpolate_prepared(prepared, indices),
            Interpolation::BSpline => BSplineInterpolator.interpolate_prepared(prepared, indices),
        }
    }
}

/// 1.0 where a continuous index lies within `[-margin, n - 1 + margin]` on every axis, else 0.0.
///
/// `shape` is the tensor shape `[z, y, x]` of the sampled volume.
pub fn inside_mask<B: Backend>(indices: Tensor<B, 2>, shape: [usize; 3], margin: f64) -> Tensor<B, 1> {
    let [d, h, w] = shape;
    let limits = [w, h, d];
    let mut mask: Option<Tensor<B, 1>> = None;
    for (axis, n) in limits.iter().enumerate() {
        let coord = indices.clone().narrow(1, axis, 1).squeeze::<1>(1);
        let upper = (*n as f64 - 1.0) + margin;
        let inside = coord.clone().greater_equal_elem(-margin).float() * coord.lower_equal_elem(upper).float();
        mask = Some(match mask {
            Some(m) => m * inside,
            None => inside,
        });
    }
    mask.unwrap_or_else(|| Tensor::ones([indices.dims()[0]], &indices.device()))
}
