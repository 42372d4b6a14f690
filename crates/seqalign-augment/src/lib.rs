//! Data augmentation for co-registered multi-sequence volume sets.
//!
//! Geometric augmentation perturbs a whole set with one shared random
//! similarity transform so that sequences stay aligned with each other.
//! Intensity augmentation draws independent filter parameters per volume.
//! Radial distortion fields are available as a dense
//! [`DisplacementFieldTransform`](seqalign_core::transform::DisplacementFieldTransform).

pub mod distortion;
pub mod error;
pub mod intensity;
pub mod morph;

pub use distortion::{radial_distortion_transform, random_radial_distortion_transform, RadialCoefficients};
pub use error::{AugmentError, Result};
pub use intensity::{augment_intensity, IntensityAugmentationRanges};
pub use morph::{apply_morph_augmentation, fill_value, random_similarity_transform, resample_in_place};
pub use seqalign_core::geometry::{Interval, RadialDistortionRanges, SimilarityRanges};
