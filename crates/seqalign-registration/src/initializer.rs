//! Initial transform for registration.

use burn::tensor::backend::Backend;
use seqalign_core::spatial::{Point, Point3};
use seqalign_core::transform::Euler3DTransform;
use seqalign_core::{Image, ImageGrid};

/// Seeds a rigid transform from image geometry alone.
pub struct CenteredTransformInitializer;

/// Physical position of the continuous index `(size - 1) / 2`, the middle of
/// the voxel centers.
pub fn geometric_center(grid: &ImageGrid<3>) -> Point3 {
    let size = grid.size();
    let index = Point::new([0, 1, 2].map(|i| size[i].saturating_sub(1) as f64 / 2.0));
    grid.transform_continuous_index_to_physical_point(&index)
}

impl CenteredTransformInitializer {
    /// Rotation about the fixed image's center with the translation that
    /// carries that center onto the moving image's center.
    ///
    /// No intensities are read.
    pub fn geometry<B: Backend>(fixed: &Image<B, 3>, moving: &Image<B, 3>) -> Euler3DTransform {
        let fixed_center = geometric_center(&fixed.grid());
        let moving_center = geometric_center(&moving.grid());
        let offset = (moving_center - fixed_center).to_array();
        Euler3DTransform::new([0.0; 3], offset, fixed_center)
    }
}
