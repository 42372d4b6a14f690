//! Core types for multi-sequence volume alignment: physical-space geometry,
//! images, transforms, interpolators and filters.

pub mod error;
pub mod filter;
pub mod geometry;
pub mod image;
pub mod interpolation;
pub mod io;
pub mod spatial;
pub mod transform;

pub use error::{CoreError, Result};
pub use image::{Image, ImageGrid};
pub use io::{VolumeReader, VolumeWriter};
pub use spatial::{Direction, Point, Spacing, Vector};
