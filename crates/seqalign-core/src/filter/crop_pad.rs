//! Centered crop/pad of the voxel array.

use crate::error::{CoreError, Result};
use crate::image::Image;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use std::ops::Range;

/// Crop or pad the voxels of `image` to `shape` (`[z, y, x]`), keeping the content centered.
///
/// Axes that grow are padded on both sides with the mean intensity of the
/// input; axes that shrink keep their central voxels. Only the voxel array is
/// returned, since the physical grid of a cropped/padded volume is not used.
pub fn fit_to_size<B: Backend>(image: &Image<B, 3>, shape: [usize; 3]) -> Result<Tensor<B, 3>> {
    if shape.contains(&0) {
        return Err(CoreError::invalid_parameter("shape", format!("must be positive, got {:?}", shape)));
    }

    let data = image.data().clone();
    let input_shape = data.dims();
    if input_shape == shape {
        return Ok(data);
    }

    let mut source: [Range<usize>; 3] = [0..0, 0..0, 0..0];
    let mut target: [Range<usize>; 3] = [0..0, 0..0, 0..0];
    for axis in 0..3 {
        let (n, m) = (input_shape[axis], shape[axis]);
        if m >= n {
            let start = (m - n) / 2;
            source[axis] = 0..n;
            target[axis] = start..start + n;
        } else {
            let start = (n - m) / 2;
            source[axis] = start..start + m;
            target[axis] = 0..m;
        }
    }

    let fill = data.clone().mean().into_scalar();
    let device = data.device();
    let canvas = Tensor::<B, 3>::full(shape, fill, &device);
    Ok(canvas.slice_assign(target, data.slice(source)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{Direction, Point, Spacing};
    use burn::tensor::TensorData;
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    fn image(shape: [usize; 3]) -> Image<B, 3> {
        let device = Default::default();
        let n: usize = shape.iter().product();
        let values: Vec<f32> = (0..n).map(|i| i as f32).collect();
        let data = Tensor::<B, 3>::from_data(TensorData::new(values, shape), &device);
        Image::new(data, Point::origin(), Spacing::uniform(1.0), Direction::identity())
    }

    #[test]
    fn test_pad_centers_content_with_mean() {
        let out = fit_to_size(&image([1, 1, 4]), [1, 1, 8]).unwrap();
        let values = out.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![1.5, 1.5, 0.0, 1.0, 2.0, 3.0, 1.5, 1.5]);
    }

    #[test]
    fn test_crop_keeps_center() {
        let out = fit_to_size(&image([1, 1, 7]), [1, 1, 3]).unwrap();
        let values = out.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_mixed_crop_and_pad() {
        let out = fit_to_size(&image([4, 2, 6]), [2, 4, 6]).unwrap();
        assert_eq!(out.dims(), [2, 4, 6]);
    }

    #[test]
    fn test_zero_shape_is_rejected() {
        assert!(fit_to_size(&image([2, 2, 2]), [0, 2, 2]).is_err());
    }
}
