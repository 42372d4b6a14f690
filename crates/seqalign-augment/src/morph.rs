//! Random similarity perturbation of a co-registered volume set.

use crate::error::Result;
use burn::tensor::backend::Backend;
use rand::RngCore;
use seqalign_core::filter::{nan_median, round_down_to_hundredths, ResampleImageFilter};
use seqalign_core::geometry::{random_similarity_parameters, SimilarityRanges};
use seqalign_core::interpolation::BSplineInterpolator;
use seqalign_core::transform::Similarity3DTransform;
use seqalign_core::Image;

/// Similarity transform about the volume's physical center with parameters
/// drawn from `ranges`.
pub fn random_similarity_transform<B: Backend>(
    volume: &Image<B, 3>,
    ranges: &SimilarityRanges,
    rng: &mut dyn RngCore,
) -> Result<Similarity3DTransform> {
    let parameters = random_similarity_parameters(ranges, rng);
    Ok(Similarity3DTransform::from_parameters(&parameters, volume.physical_center())?)
}

/// Out-of-bounds value for resampling `volume`: its NaN-ignoring median
/// truncated to two decimals, or 0 when every voxel is NaN.
pub fn fill_value<B: Backend>(volume: &Image<B, 3>) -> f64 {
    nan_median(volume).map(round_down_to_hundredths).unwrap_or(0.0)
}

/// Resample `volume` in place through `transform` with cubic B-spline
/// interpolation. The output keeps the input's grid.
pub fn resample_in_place<B: Backend>(volume: &Image<B, 3>, transform: &Similarity3DTransform) -> Image<B, 3> {
    ResampleImageFilter::new_from_reference(volume, *transform, BSplineInterpolator::new())
        .with_default_pixel_value(fill_value(volume))
        .apply(volume)
}

/// Perturb every volume with one shared random similarity transform.
///
/// The transform is drawn once, centered on the first volume, so that
/// co-registered sequences stay aligned with each other. Each volume is
/// resampled on its own grid and padded with its own fill value. Output order
/// matches input order; an empty set yields an empty set without touching
/// `rng`.
pub fn apply_morph_augmentation<B: Backend>(
    volumes: &[Image<B, 3>],
    ranges: &SimilarityRanges,
    rng: &mut dyn RngCore,
) -> Result<Vec<Image<B, 3>>> {
    let Some(first) = volumes.first() else {
        return Ok(Vec::new());
    };
    let transform = random_similarity_transform(first, ranges, rng)?;
    tracing::debug!(%transform, volumes = volumes.len(), "morph augmentation");

    Ok(volumes.iter().map(|volume| resample_in_place(volume, &transform)).collect())
}
