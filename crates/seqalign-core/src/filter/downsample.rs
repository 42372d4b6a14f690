//! Integer shrinking for pyramid levels.

use crate::image::Image;
use crate::spatial::Point;
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};

/// Keeps every `factor`-th voxel along each axis.
///
/// The output has `max(1, n / factor)` voxels per axis and spacing multiplied
/// by the factor. The kept voxels are centered in the input so that the
/// physical center of the image does not drift between pyramid levels; the
/// origin is moved to the first kept voxel.
pub struct DownsampleFilter<B: Backend> {
    factors: Vec<usize>,
    _b: std::marker::PhantomData<B>,
}

impl<B: Backend> DownsampleFilter<B> {
    /// `factors` holds one value per axis `(x, y, z)` or a single value for all axes.
    pub fn new(factors: Vec<usize>) -> Self {
        Self {
            factors,
            _b: std::marker::PhantomData,
        }
    }

    pub fn uniform(factor: usize) -> Self {
        Self::new(vec![factor])
    }

    pub fn apply<const D: usize>(&self, image: &Image<B, D>) -> Image<B, D> {
        let mut data = image.data().clone();
        let device = data.device();
        let dims: [usize; D] = data.dims();

        let mut spacing = *image.spacing();
        let mut first_index = Point::<D>::origin();

        for dim in 0..D {
            let axis = D - 1 - dim;
            let factor = self.factors.get(axis).or(self.factors.first()).copied().unwrap_or(1);
            if factor <= 1 {
                continue;
            }

            let size = dims[dim];
            let out_size = (size / factor).max(1);
            let offset = (size - 1).saturating_sub((out_size - 1) * factor) / 2;
            let kept: Vec<i64> = (0..out_size).map(|i| (offset + i * factor) as i64).collect();
            let indices = Tensor::<B, 1, Int>::from_data(TensorData::new(kept, [out_size]), &device);

            data = data.select(dim, indices);
            spacing[axis] *= factor as f64;
            first_index[axis] = offset as f64;
        }

        let origin = image.transform_continuous_index_to_physical_point(&first_index);
        Image::new(data, origin, spacing, *image.direction())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{Direction, Spacing};
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn test_shrink_keeps_center() {
        let device = Default::default();
        let data = Tensor::<B, 3>::zeros([9, 10, 12], &device);
        let image = Image::new(data, Point::new([0.0, 0.0, 0.0]), Spacing::new([1.0, 1.0, 2.0]), Direction::identity());
        let center_before = image.transform_continuous_index_to_physical_point(&Point::new([5.5, 4.5, 4.0]));

        let shrunk = DownsampleFilter::uniform(2).apply(&image);
        assert_eq!(shrunk.size(), [6, 5, 4]);
        assert_eq!(shrunk.spacing().to_array(), [2.0, 2.0, 4.0]);

        // physical center of the kept voxels stays where it was
        let [sx, sy, sz] = shrunk.size();
        let center_after = shrunk.transform_continuous_index_to_physical_point(&Point::new([
            (sx - 1) as f64 / 2.0,
            (sy - 1) as f64 / 2.0,
            (sz - 1) as f64 / 2.0,
        ]));
        assert!(center_before.distance(&center_after) < 1.0 + 1e-9);
    }

    #[test]
    fn test_factor_one_is_identity() {
        let device = Default::default();
        let data = Tensor::<B, 3>::ones([3, 4, 5], &device);
        let image = Image::new(data, Point::new([1.0, 2.0, 3.0]), Spacing::uniform(1.0), Direction::identity());
        let out = DownsampleFilter::uniform(1).apply(&image);
        assert_eq!(out.size(), [5, 4, 3]);
        assert_eq!(out.origin(), image.origin());
    }

    #[test]
    fn test_factor_larger_than_axis_keeps_one_voxel() {
        let device = Default::default();
        let data = Tensor::<B, 3>::ones([2, 8, 8], &device);
        let image = Image::new(data, Point::origin(), Spacing::uniform(1.0), Direction::identity());
        let out = DownsampleFilter::uniform(4).apply(&image);
        assert_eq!(out.size(), [2, 2, 1]);
    }
}
