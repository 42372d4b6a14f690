//! Spatial transforms mapping output (fixed) physical space to input (moving) physical space.

pub mod displacement_field;
pub mod euler;
pub mod similarity;
pub mod trait_;
pub mod translation;

pub use displacement_field::DisplacementFieldTransform;
pub use euler::Euler3DTransform;
pub use similarity::Similarity3DTransform;
pub use trait_::{ParametricTransform, Transform};
pub use translation::TranslationTransform;

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use nalgebra::Matrix3;

pub(crate) fn matrix_tensor<B: Backend>(m: &Matrix3<f64>, device: &B::Device) -> Tensor<B, 2> {
    let mut data = Vec::with_capacity(9);
    for r in 0..3 {
        for c in 0..3 {
            data.push(m[(r, c)] as f32);
        }
    }
    Tensor::from_data(TensorData::new(data, [3, 3]), device)
}

pub(crate) fn row_tensor<B: Backend>(v: [f64; 3], device: &B::Device) -> Tensor<B, 2> {
    Tensor::from_data(TensorData::new(v.map(|c| c as f32).to_vec(), [1, 3]), device)
}

/// `y = (x - c) @ M^T + c + t` for a batch of row points.
pub(crate) fn apply_about_center<B: Backend>(
    points: Tensor<B, 2>,
    matrix: Tensor<B, 2>,
    center: Tensor<B, 2>,
    translation: Tensor<B, 2>,
) -> Tensor<B, 2> {
    (points - center.clone()).matmul(matrix.transpose()) + center + translation
}

/// Split a `[3]` tensor into three `[1]` tensors.
pub(crate) fn components<B: Backend>(v: Tensor<B, 1>) -> [Tensor<B, 1>; 3] {
    [v.clone().slice([0..1]), v.clone().slice([1..2]), v.slice([2..3])]
}

/// Assemble nine `[1]` tensors, row-major, into a `[3, 3]` matrix.
pub(crate) fn assemble_matrix<B: Backend>(entries: [Tensor<B, 1>; 9]) -> Tensor<B, 2> {
    let [r11, r12, r13, r21, r22, r23, r31, r32, r33] = entries;
    let row1 = Tensor::cat(vec![r11, r12, r13], 0).reshape([1, 3]);
    let row2 = Tensor::cat(vec![r21, r22, r23], 0).reshape([1, 3]);
    let row3 = Tensor::cat(vec![r31, r32, r33], 0).reshape([1, 3]);
    Tensor::cat(vec![row1, row2, row3], 0)
}
