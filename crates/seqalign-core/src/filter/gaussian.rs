//! Separable Gaussian smoothing with sigmas in physical units.

use crate::image::Image;
use crate::spatial::Spacing;
use burn::tensor::backend::Backend;
use burn::tensor::module::conv1d;
use burn::tensor::ops::ConvOptions;
use burn::tensor::{Shape, Tensor, TensorData};

/// Gaussian smoothing filter.
///
/// Sigmas are given per physical axis `(x, y, z)` in the image's physical
/// units, so the same schedule smooths anisotropic volumes consistently. The
/// kernel is truncated at three sigmas and renormalized near the borders, which
/// keeps edge intensities from being pulled toward zero.
pub struct GaussianFilter<B: Backend> {
    sigmas: Vec<f64>,
    max_kernel_width: usize,
    _b: std::marker::PhantomData<B>,
}

impl<B: Backend> GaussianFilter<B> {
    /// `sigmas` holds one value per axis, or a single value used for all axes.
    pub fn new(sigmas: Vec<f64>) -> Self {
        Self {
            sigmas,
            max_kernel_width: 63,
            _b: std::marker::PhantomData,
        }
    }

    pub fn isotropic(sigma: f64) -> Self {
        Self::new(vec![sigma])
    }

    /// Cap on the kernel width (`2 * radius + 1`).
    pub fn with_max_kernel_width(mut self, width: usize) -> Self {
        self.max_kernel_width = width.max(1);
        self
    }

    pub fn apply<const D: usize>(&self, image: &Image<B, D>) -> Image<B, D> {
        let data = self.apply_tensor(image.data().clone(), image.spacing());
        Image::new(data, *image.origin(), *image.spacing(), *image.direction())
    }

    /// Smooth a tensor whose dims are in reverse axis order (`[z, y, x]` for 3D).
    pub fn apply_tensor<const D: usize>(&self, input: Tensor<B, D>, spacing: &Spacing<D>) -> Tensor<B, D> {
        let mut data = input;
        let device = data.device();

        for dim in 0..D {
            let axis = D - 1 - dim;
            let sigma = self.sigmas.get(axis).or(self.sigmas.first()).copied().unwrap_or(0.0);
            if sigma <= 1e-6 {
                continue;
            }

            let voxel_sigma = sigma / spacing[axis];
            let radius = (3.0 * voxel_sigma).ceil() as usize;
            let width = (2 * radius + 1).min(self.max_kernel_width.max(1) | 1);
            let kernel = Self::generate_kernel(voxel_sigma, (width - 1) / 2);
            let kernel = Tensor::<B, 1>::from_data(TensorData::new(kernel.clone(), [kernel.len()]), &device);

            data = Self::convolve_1d::<D>(data, kernel, dim);
        }
        data
    }

    fn generate_kernel(sigma: f64, radius: usize) -> Vec<f32> {
        let two_sigma2 = 2.0 * sigma * sigma;
        let values: Vec<f64> = (0..=(2 * radius))
            .map(|i| {
                let x = i as f64 - radius as f64;
                (-x * x / two_sigma2).exp()
            })
            .collect();
        let sum: f64 = values.iter().sum();
        values.into_iter().map(|v| (v / sum) as f32).collect()
    }

    fn convolve_1d<const D: usize>(input: Tensor<B, D>, kernel: Tensor<B, 1>, dim: usize) -> Tensor<B, D> {
        let dims: [usize; D] = input.dims();
        let device = input.device();

        // move `dim` last, flatten the rest into the batch
        let mut permutation = [0isize; D];
        let mut next = 0;
        for i in 0..D {
            if i != dim {
                permutation[next] = i as isize;
                next += 1;
            }
        }
        permutation[D - 1] = dim as isize;

        let length = dims[dim];
        let batch: usize = dims.iter().product::<usize>() / length.max(1);
        let kernel_size = kernel.dims()[0];
        let options = ConvOptions::new([1], [kernel_size / 2], [1], 1);
        let kernel = kernel.reshape([1, 1, kernel_size]);

        let lines = input.permute(permutation).reshape([batch, 1, length]);
        let smoothed = conv1d(lines, kernel.clone(), None, options.clone());

        // kernel mass that fell inside the line at each position
        let ones = Tensor::<B, 3>::ones([1, 1, length], &device);
        let mass = conv1d(ones, kernel, None, options).reshape([1, 1, length]);
        let smoothed = smoothed / mass;

        let mut permuted_shape = [0usize; D];
        for (i, p) in permutation.iter().enumerate() {
            permuted_shape[i] = dims[*p as usize];
        }
        let mut inverse = [0isize; D];
        for (new_pos, old_pos) in permutation.iter().enumerate() {
            inverse[*old_pos as usize] = new_pos as isize;
        }
        smoothed.reshape(Shape::new(permuted_shape)).permute(inverse)
    }
}
