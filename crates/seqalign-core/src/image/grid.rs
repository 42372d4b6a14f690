//! Voxel grids: size plus the index-to-physical mapping.

use crate::spatial::{Direction, Point, Spacing, Vector};
use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};

/// The sampling lattice of an image without its intensities.
///
/// `size` is ordered `(x, y, z)` like every other metadata field, which is the
/// reverse of the tensor shape `[z, y, x]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageGrid<const D: usize> {
    size: [usize; D],
    origin: Point<D>,
    spacing: Spacing<D>,
    direction: Direction<D>,
}

impl<const D: usize> ImageGrid<D> {
    pub fn new(size: [usize; D], origin: Point<D>, spacing: Spacing<D>, direction: Direction<D>) -> Self {
        Self {
            size,
            origin,
            spacing,
            direction,
        }
    }

    pub fn size(&self) -> [usize; D] {
        self.size
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

    /// Tensor shape of data living on this grid (slowest axis first).
    pub fn shape(&self) -> [usize; D] {
        let mut shape = self.size;
        shape.reverse();
        shape
    }

    pub fn number_of_voxels(&self) -> usize {
        self.size.iter().product()
    }

    /// Physical extent `spacing * size` along each axis.
    pub fn physical_extent(&self) -> [f64; D] {
        let mut extent = [0.0; D];
        for (i, e) in extent.iter_mut().enumerate() {
            *e = self.spacing[i] * self.size[i] as f64;
        }
        extent
    }

    // Directions are orthonormal in practice; the transpose covers degenerate headers.
    fn inverse_direction(&self) -> Direction<D> {
        self.direction
            .try_inverse()
            .unwrap_or_else(|| self.direction.transpose())
    }

    /// `index = D^-1 (point - origin) / spacing`
    pub fn transform_physical_point_to_continuous_index(&self, point: &Point<D>) -> Point<D> {
        let rotated = self.inverse_direction() * (*point - self.origin);
        let mut index = Point::<D>::origin();
        for i in 0..D {
            index[i] = rotated[i] / self.spacing[i];
        }
        index
    }

    /// `point = origin + D (index * spacing)`
    pub fn transform_continuous_index_to_physical_point(&self, index: &Point<D>) -> Point<D> {
        let mut scaled = Vector::<D>::zeros();
        for i in 0..D {
            scaled[i] = index[i] * self.spacing[i];
        }
        self.origin + self.direction * scaled
    }

    /// Physical position of the continuous index `size / 2`.
    pub fn physical_center(&self) -> Point<D> {
        let mut index = Point::<D>::origin();
        for i in 0..D {
            index[i] = self.size[i] as f64 / 2.0;
        }
        self.transform_continuous_index_to_physical_point(&index)
    }

    /// Physical positions of the `2^D` corner voxels.
    pub fn corner_points(&self) -> Vec<Point<D>> {
        (0..(1usize << D))
            .map(|mask| {
                let mut index = Point::<D>::origin();
                for i in 0..D {
                    if mask & (1 << i) != 0 {
                        index[i] = self.size[i].saturating_sub(1) as f64;
                    }
                }
                self.transform_continuous_index_to_physical_point(&index)
            })
            .collect()
    }

    fn origin_row<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        let origin: Vec<f32> = (0..D).map(|i| self.origin[i] as f32).collect();
        Tensor::<B, 1>::from_data(TensorData::new(origin, Shape::new([D])), device).reshape([1, D])
    }

    /// Batch physical points `[N, D]` to continuous indices `[N, D]`.
    pub fn world_to_index_tensor<B: Backend>(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = points.device();
        // I = (P - O) @ T with T[r, c] = inv_dir[c, r] / spacing[c]
        let inv_dir = self.inverse_direction();
        let mut t_data = Vec::with_capacity(D * D);
        for r in 0..D {
            for c in 0..D {
                t_data.push((inv_dir[(c, r)] / self.spacing[c]) as f32);
            }
        }
        let t = Tensor::<B, 2>::from_data(TensorData::new(t_data, Shape::new([D, D])), &device);
        (points - self.origin_row::<B>(&device)).matmul(t)
    }

    /// Batch continuous indices `[N, D]` to physical points `[N, D]`.
    pub fn index_to_world_tensor<B: Backend>(&self, indices: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = indices.device();
        // P = O + I @ M with M[r, c] = spacing[r] * dir[c, r]
        let mut m_data = Vec::with_capacity(D * D);
        for r in 0..D {
            for c in 0..D {
                m_data.push((self.spacing[r] * self.direction[(c, r)]) as f32);
            }
        }
        let m = Tensor::<B, 2>::from_data(TensorData::new(m_data, Shape::new([D, D])), &device);
        indices.matmul(m) + self.origin_row::<B>(&device)
    }
}

impl ImageGrid<3> {
    /// Continuous indices of every voxel, `[N, 3]` in `(x, y, z)` columns, x fastest.
    pub fn index_grid<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        generate_index_grid::<B>(self.shape(), device)
    }

    /// Continuous indices of the voxels `start..start + len` in memory order.
    pub fn index_range<B: Backend>(&self, start: usize, len: usize, device: &B::Device) -> Tensor<B, 2> {
        generate_index_range::<B>(self.shape(), start, len, device)
    }

    /// Physical positions of every voxel, `[N, 3]`, in tensor memory order.
    pub fn physical_points<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        self.index_to_world_tensor(self.index_grid::<B>(device))
    }
}

/// Continuous indices for a `[z, y, x]` tensor shape as an `[N, 3]` tensor of `(x, y, z)` rows.
pub fn generate_index_grid<B: Backend>(shape: [usize; 3], device: &B::Device) -> Tensor<B, 2> {
    let [d, h, w] = shape;
    generate_index_range::<B>(shape, 0, d * h * w, device)
}

/// Rows `start..start + len` of [`generate_index_grid`], built without the rest.
pub fn generate_index_range<B: Backend>(shape: [usize; 3], start: usize, len: usize, device: &B::Device) -> Tensor<B, 2> {
    let [_, h, w] = shape;

    let mut grid = Vec::with_capacity(len * 3);
    for flat in start..start + len {
        grid.push((flat % w) as f32);
        grid.push(((flat / w) % h) as f32);
        grid.push((flat / (w * h)) as f32);
    }

    Tensor::<B, 1>::from_data(TensorData::new(grid, Shape::new([len * 3])), device).reshape([len, 3])
}
