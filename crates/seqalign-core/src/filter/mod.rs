//! Image filters: geometric (resample, smoothing, pyramid) and intensity.

pub mod crop_pad;
pub mod downsample;
pub mod gaussian;
pub mod histogram_equalization;
pub mod noise;
pub mod pyramid;
pub mod resample;
pub mod statistics;
pub mod threshold;

pub use crop_pad::fit_to_size;
pub use downsample::DownsampleFilter;
pub use gaussian::GaussianFilter;
pub use histogram_equalization::AdaptiveHistogramEqualizationFilter;
pub use noise::AdditiveGaussianNoiseFilter;
pub use pyramid::{default_schedule, MultiResolutionPyramid};
pub use resample::{extent_grid, resample_to_extent, resample_to_spacing, ResampleImageFilter};
pub use statistics::{mean, min_max, nan_median, round_down_to_hundredths};
pub use threshold::{clip_to_range, threshold};
