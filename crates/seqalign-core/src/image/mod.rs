//! Images with physical metadata and the voxel grids they live on.

pub mod grid;
pub mod image;

pub use grid::{generate_index_grid, generate_index_range, ImageGrid};
pub use image::Image;
