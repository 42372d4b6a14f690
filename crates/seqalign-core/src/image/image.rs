//! Image type with physical metadata and coordinate transformations.

use super::ImageGrid;
use crate::error::{CoreError, Result};
use crate::spatial::{Direction, Point, Spacing};
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};

/// Medical image: a tensor of intensities plus the physical metadata that
/// places each voxel in scanner space.
///
/// # Coordinate Systems
/// * **Index space**: continuous voxel coordinates `(x, y, z)`
/// * **Physical space**: scanner coordinates in millimetres
///
/// The tensor is stored `[z, y, x]` so that `x` varies fastest in memory.
///
/// # Examples
/// ```rust
/// use seqalign_core::Image;
/// use seqalign_core::spatial::{Point3, Spacing3, Direction3};
/// use burn::tensor::Tensor;
/// use burn_ndarray::NdArray;
///
/// type Backend = NdArray<f32>;
///
/// let device = Default::default();
/// let data = Tensor::<Backend, 3>::zeros([50, 100, 100], &device);
/// let image = Image::new(data, Point3::origin(), Spacing3::new([1.0, 1.0, 2.0]), Direction3::identity());
/// assert_eq!(image.size(), [100, 100, 50]);
/// ```
#[derive(Debug, Clone)]
pub struct Image<B: Backend, const D: usize> {
    data: Tensor<B, D>,
    origin: Point<D>,
    spacing: Spacing<D>,
    direction: Direction<D>,
}

impl<B: Backend, const D: usize> Image<B, D> {
    pub fn new(data: Tensor<B, D>, origin: Point<D>, spacing: Spacing<D>, direction: Direction<D>) -> Self {
        Self {
            data,
            origin,
            spacing,
            direction,
        }
    }

    /// Wrap `data` on `grid`, checking that the tensor shape matches the grid.
    pub fn from_grid(data: Tensor<B, D>, grid: &ImageGrid<D>) -> Result<Self> {
        let actual = data.dims();
        if actual != grid.shape() {
            return Err(CoreError::shape_mismatch(&grid.shape(), &actual));
        }
        Ok(Self::new(data, *grid.origin(), *grid.spacing(), *grid.direction()))
    }

    pub fn data(&self) -> &Tensor<B, D> {
        &self.data
    }

    pub fn into_data(self) -> Tensor<B, D> {
        self.data
    }

    pub fn origin(&self) -> &Point<D> {
        &self.origin
    }

    pub fn spacing(&self) -> &Spacing<D> {
        &self.spacing
    }

    pub fn direction(&self) -> &Direction<D> {
        &self.direction
    }

    /// Tensor shape, slowest axis first.
    pub fn shape(&self) -> [usize; D] {
        self.data.dims()
    }

    /// Voxel counts ordered `(x, y, z)`.
    pub fn size(&self) -> [usize; D] {
        let mut size = self.shape();
        size.reverse();
        size
    }

    pub fn grid(&self) -> ImageGrid<D> {
        ImageGrid::new(self.size(), self.origin, self.spacing, self.direction)
    }

    /// Same metadata, new intensities.
    pub fn with_data(&self, data: Tensor<B, D>) -> Result<Self> {
        Self::from_grid(data, &self.grid())
    }

    pub fn transform_physical_point_to_continuous_index(&self, point: &Point<D>) -> Point<D> {
        self.grid().transform_physical_point_to_continuous_index(point)
    }

    pub fn transform_continuous_index_to_physical_point(&self, index: &Point<D>) -> Point<D> {
        self.grid().transform_continuous_index_to_physical_point(index)
    }

    /// Physical position of the continuous index `size / 2`.
    pub fn physical_center(&self) -> Point<D> {
        self.grid().physical_center()
    }

    /// Batch physical points `[N, D]` to continuous indices.
    pub fn world_to_index_tensor(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        self.grid().world_to_index_tensor(points)
    }

    /// Batch continuous indices `[N, D]` to physical points.
    pub fn index_to_world_tensor(&self, indices: Tensor<B, 2>) -> Tensor<B, 2> {
        self.grid().index_to_world_tensor(indices)
    }
}

impl<B: Backend> Image<B, 3> {
    /// Build an image from voxel values laid out `[z, y, x]` with x fastest.
    pub fn from_vec(values: Vec<f32>, grid: &ImageGrid<3>, device: &B::Device) -> Result<Self> {
        if values.len() != grid.number_of_voxels() {
            return Err(CoreError::shape_mismatch(&[grid.number_of_voxels()], &[values.len()]));
        }
        let data = Tensor::<B, 1>::from_data(TensorData::new(values, [grid.number_of_voxels()]), device)
            .reshape(grid.shape());
        Self::from_grid(data, grid)
    }

    /// Voxel values in memory order, converted to `f32`; empty if the
    /// backend cannot hand them out.
    pub fn to_vec(&self) -> Vec<f32> {
        match self.data.clone().into_data().convert::<f32>().to_vec::<f32>() {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(error = ?e, "cannot read voxel values");
                Vec::new()
            }
        }
    }
}
