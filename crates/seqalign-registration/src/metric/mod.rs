//! Metric implementations.
//!
//! Registration scores alignment with Mattes mutual information, which copes
//! with different contrasts between the sequences of one study.

pub mod histogram;
pub mod mattes;
pub mod sampling;
pub mod trait_;

pub use mattes::{MattesLevel, MattesMutualInformation};
pub use sampling::{SamplingStrategy, MINIMUM_RANDOM_SAMPLES};
pub use trait_::Metric;
