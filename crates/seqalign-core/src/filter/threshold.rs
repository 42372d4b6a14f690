//! Intensity thresholding.

use crate::image::Image;
use burn::tensor::backend::Backend;

/// Lower bound used when clamping the upper end of a display range.
pub const CLIP_FLOOR: f64 = -2000.0;
/// Upper bound used when clamping the lower end of a display range.
pub const CLIP_CEILING: f64 = 5000.0;

/// Keep voxels in `[lower, upper]` and set every other voxel to `outside`.
///
/// NaN voxels compare false against both bounds and are replaced too.
pub fn threshold<B: Backend, const D: usize>(image: &Image<B, D>, lower: f64, upper: f64, outside: f64) -> Image<B, D> {
    let data = image.data().clone();
    let keep = data.clone().greater_equal_elem(lower).float() * data.clone().lower_equal_elem(upper).float();
    // NaN * 0 is still NaN, so zero the rejected voxels before blending
    let kept = data.mask_fill(keep.clone().equal_elem(0.0), 0.0);
    let fill = keep.neg().add_scalar(1.0).mul_scalar(outside);
    Image::new(kept + fill, *image.origin(), *image.spacing(), *image.direction())
}

/// Saturate intensities to `range = (low, high)`.
///
/// Values above `high` become `high`, then values below `low` become `low`.
/// A voxel below [`CLIP_FLOOR`] is set to `high` by the first pass.
pub fn clip_to_range<B: Backend, const D: usize>(image: &Image<B, D>, range: (f64, f64)) -> Image<B, D> {
    let (low, high) = range;
    let image = threshold(image, CLIP_FLOOR, high, high);
    threshold(&image, low, CLIP_CEILING, low)
}
