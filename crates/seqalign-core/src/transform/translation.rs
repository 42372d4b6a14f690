//! Pure translation, also used as the identity mapping for grid changes.

use super::trait_::Transform;
use crate::spatial::Vector;
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use serde::{Deserialize, Serialize};

/// Translates points by a fixed physical offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TranslationTransform<const D: usize> {
    offset: Vector<D>,
}

impl<const D: usize> TranslationTransform<D> {
    pub fn new(offset: Vector<D>) -> Self {
        Self { offset }
    }

    pub fn identity() -> Self {
        Self::new(Vector::zeros())
    }

    pub fn offset(&self) -> &Vector<D> {
        &self.offset
    }

    pub fn is_identity(&self) -> bool {
        self.offset.norm_squared() == 0.0
    }
}

impl<B: Backend, const D: usize> Transform<B, D> for TranslationTransform<D> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        if self.is_identity() {
            return points;
        }
        let offset: Vec<f32> = self.offset.to_array().iter().map(|&v| v as f32).collect();
        let t = Tensor::<B, 1>::from_data(TensorData::new(offset, [D]), &points.device()).reshape([1, D]);
        points + t
    }
}
