//! Resample image filter.
//!
//! Resamples an image into a new grid using a transform and an interpolator,
//! plus the extent-preserving grid change used for isotropic resampling.

use crate::error::{CoreError, Result};
use crate::image::{Image, ImageGrid};
use crate::interpolation::{inside_mask, Interpolator, LinearInterpolator};
use crate::spatial::Spacing3;
use crate::transform::{Transform, TranslationTransform};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use std::marker::PhantomData;

/// Points are pushed through the pipeline in chunks of this many voxels.
const DEFAULT_CHUNK_SIZE: usize = 1 << 18;

/// Continuous indices beyond half a voxel outside the input are outside its field of view.
const FIELD_OF_VIEW_MARGIN: f64 = 0.5;

/// Resample image filter.
///
/// For every voxel of the output grid the physical position is mapped through
/// the transform (output space to input space) and the input is interpolated
/// there. Positions falling outside the input's field of view receive the
/// default pixel value.
pub struct ResampleImageFilter<B, T, I>
where
    B: Backend,
    T: Transform<B, 3>,
    I: Interpolator<B>,
{
    grid: ImageGrid<3>,
    transform: T,
    interpolator: I,
    default_pixel_value: f64,
    chunk_size: usize,
    _phantom: PhantomData<B>,
}

impl<B, T, I> ResampleImageFilter<B, T, I>
where
    B: Backend,
    T: Transform<B, 3>,
    I: Interpolator<B>,
{
    pub fn new(grid: ImageGrid<3>, transform: T, interpolator: I) -> Self {
        Self {
            grid,
            transform,
            interpolator,
            default_pixel_value: 0.0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            _phantom: PhantomData,
        }
    }

    /// Output on the exact grid of `reference`.
    pub fn new_from_reference(reference: &Image<B, 3>, transform: T, interpolator: I) -> Self {
        Self::new(reference.grid(), transform, interpolator)
    }

    pub fn with_default_pixel_value(mut self, value: f64) -> Self {
        self.default_pixel_value = value;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn grid(&self) -> &ImageGrid<3> {
        &self.grid
    }

    pub fn apply(&self, input: &Image<B, 3>) -> Image<B, 3> {
        let device = input.data().device();
        let prepared = self.interpolator.prepare(input.data());
        let input_shape = input.shape();

        let total = self.grid.number_of_voxels();

        let mut chunks = Vec::with_capacity(total.div_ceil(self.chunk_size));
        let mut start = 0;
        while start < total {
            let len = self.chunk_size.min(total - start);
            let indices = self.grid.index_range::<B>(start, len, &device);

            let output_points = self.grid.index_to_world_tensor(indices);
            let input_points = self.transform.transform_points(output_points);
            let input_indices = input.world_to_index_tensor(input_points);

            let values = self.interpolator.interpolate_prepared(&prepared, input_indices.clone());
            let inside = inside_mask(input_indices, input_shape, FIELD_OF_VIEW_MARGIN);
            let outside = inside.clone().neg().add_scalar(1.0);
            chunks.push(values * inside + outside.mul_scalar(self.default_pixel_value));

            start += len;
        }

        let flat = if chunks.len() == 1 {
            chunks.remove(0)
        } else {
            Tensor::cat(chunks, 0)
        };
        let data = flat.reshape(self.grid.shape());

        Image::new(data, *self.grid.origin(), *self.grid.spacing(), *self.grid.direction())
    }
}

/// Grid covering the same physical extent as `grid` at a new spacing or size.
///
/// Exactly one of `spacing` and `size` must be given. With a spacing, each
/// axis gets `trunc(old_spacing * old_size / spacing)` voxels (at least one);
/// with a size, the spacing is `old_spacing * old_size / size`. Origin and
/// direction are kept.
pub fn extent_grid(grid: &ImageGrid<3>, spacing: Option<Spacing3>, size: Option<[usize; 3]>) -> Result<ImageGrid<3>> {
    let old_size = grid.size();
    let old_spacing = grid.spacing();

    let (new_size, new_spacing) = match (spacing, size) {
        (Some(spacing), None) => {
            if !spacing.is_valid() {
                return Err(CoreError::range_configuration(format!(
                    "spacing must be positive, got {:?}",
                    spacing.to_array()
                )));
            }
            let mut new_size = [0usize; 3];
            for axis in 0..3 {
                let extent = old_spacing[axis] * old_size[axis] as f64;
                new_size[axis] = ((extent / spacing[axis]).trunc() as usize).max(1);
            }
            (new_size, spacing)
        }
        (None, Some(size)) => {
            if size.contains(&0) {
                return Err(CoreError::range_configuration(format!(
                    "size must be positive, got {:?}",
                    size
                )));
            }
            let mut new_spacing = *old_spacing;
            for axis in 0..3 {
                new_spacing[axis] = old_spacing[axis] * old_size[axis] as f64 / size[axis] as f64;
            }
            (size, new_spacing)
        }
        (Some(_), Some(_)) => {
            return Err(CoreError::range_configuration(
                "spacing and size are mutually exclusive",
            ))
        }
        (None, None) => return Err(CoreError::range_configuration("one of spacing or size is required")),
    };

    Ok(ImageGrid::new(new_size, *grid.origin(), new_spacing, *grid.direction()))
}

/// Resample `image` to a new spacing or size while covering the same physical extent.
///
/// See [`extent_grid`] for the grid rules. The argument check happens before
/// any voxel is touched.
pub fn resample_to_extent<B, I>(
    image: &Image<B, 3>,
    spacing: Option<Spacing3>,
    size: Option<[usize; 3]>,
    interpolator: I,
) -> Result<Image<B, 3>>
where
    B: Backend,
    I: Interpolator<B>,
{
    let grid = extent_grid(&image.grid(), spacing, size)?;
    tracing::debug!(from = ?image.size(), to = ?grid.size(), spacing = ?grid.spacing().to_array(), "resampling to extent");
    Ok(ResampleImageFilter::new(grid, TranslationTransform::<3>::identity(), interpolator).apply(image))
}

/// [`resample_to_extent`] with linear interpolation.
pub fn resample_to_spacing<B: Backend>(image: &Image<B, 3>, spacing: Spacing3) -> Result<Image<B, 3>> {
    resample_to_extent(image, Some(spacing), None, LinearInterpolator::new())
}
