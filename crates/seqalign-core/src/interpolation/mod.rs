//! Sampling voxel data at continuous indices.

pub mod bspline;
pub mod linear;
pub mod trait_;

pub use bspline::BSplineInterpolator;
pub use linear::LinearInterpolator;
pub use trait_::{inside_mask, Interpolation, Interpolator};
