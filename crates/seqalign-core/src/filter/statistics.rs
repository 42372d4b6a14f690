//! Whole-image intensity statistics.

use crate::image::Image;
use burn::tensor::backend::Backend;

fn voxels<B: Backend, const D: usize>(image: &Image<B, D>) -> Vec<f32> {
    match image.data().clone().into_data().convert::<f32>().to_vec::<f32>() {
        Ok(values) => values,
        Err(e) => {
            tracing::warn!(error = ?e, "cannot read voxel values, treating the image as empty");
            Vec::new()
        }
    }
}

/// Median of the non-NaN voxels, averaging the two middle values for even counts.
///
/// Computed in the voxel precision. Returns `None` when every voxel is NaN.
pub fn nan_median<B: Backend, const D: usize>(image: &Image<B, D>) -> Option<f32> {
    let mut values: Vec<f32> = voxels(image).into_iter().filter(|v| !v.is_nan()).collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    let median = if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    };
    Some(median)
}

/// Smallest and largest finite voxel values.
pub fn min_max<B: Backend, const D: usize>(image: &Image<B, D>) -> Option<(f32, f32)> {
    voxels(image)
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

pub fn mean<B: Backend, const D: usize>(image: &Image<B, D>) -> f64 {
    let values = voxels(image);
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64
}

/// Truncate toward zero at two decimal places: `trunc(100 v) / 100`.
///
/// The scaling happens in voxel precision, so a stored `0.29` stays `0.29`.
pub fn round_down_to_hundredths(value: f32) -> f64 {
    (value * 100.0).trunc() as f64 / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{Direction, Point, Spacing};
    use burn::tensor::{Tensor, TensorData};
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    fn line(values: Vec<f32>) -> Image<B, 3> {
        let device = Default::default();
        let n = values.len();
        let data = Tensor::<B, 3>::from_data(TensorData::new(values, [1, 1, n]), &device);
        Image::new(data, Point::origin(), Spacing::uniform(1.0), Direction::identity())
    }

    #[test]
    fn test_nan_median_skips_nan() {
        assert_eq!(nan_median(&line(vec![5.0, f32::NAN, 1.0, 3.0])), Some(3.0));
        assert_eq!(nan_median(&line(vec![4.0, 1.0, 3.0, 2.0])), Some(2.5));
        assert_eq!(nan_median(&line(vec![f32::NAN, f32::NAN])), None);
    }

    #[test]
    fn test_min_max_and_mean() {
        let image = line(vec![2.0, -1.0, 5.0, f32::INFINITY]);
        assert_eq!(min_max(&image), Some((-1.0, 5.0)));
        assert_eq!(mean(&line(vec![1.0, 2.0, 3.0, 6.0])), 3.0);
    }

    #[test]
    fn test_round_down_to_hundredths() {
        assert_eq!(round_down_to_hundredths(3.14159), 3.14);
        assert_eq!(round_down_to_hundredths(2.999), 2.99);
        assert_eq!(round_down_to_hundredths(-1.237), -1.23);
        assert_eq!(round_down_to_hundredths(0.0), 0.0);
    }

    #[test]
    fn test_round_down_keeps_exact_hundredths() {
        assert_eq!(round_down_to_hundredths(0.29), 0.29);
        assert_eq!(round_down_to_hundredths(0.57), 0.57);
        let median = nan_median(&line(vec![0.1, 0.29, 0.5])).unwrap();
        assert_eq!(round_down_to_hundredths(median), 0.29);
    }
}
