//! Mattes mutual information.

use super::histogram::{box_window, cubic_bspline_window, mutual_information, BinMapping};
use super::sampling::SamplingStrategy;
use super::trait_::Metric;
use crate::error::{RegistrationError, Result};
use crate::validation::validate_histogram_bins;
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor};
use rand::RngCore;
use seqalign_core::filter::min_max;
use seqalign_core::interpolation::{inside_mask, Interpolation, Interpolator, LinearInterpolator};
use seqalign_core::transform::ParametricTransform;
use seqalign_core::{Image, ImageGrid};

/// Samples are pushed through the histogram in chunks of this size.
const CHUNK_SIZE: usize = 32768;

/// Mutual information metric after Mattes et al.
///
/// Fixed intensities fall into bins through a box window and moving
/// intensities through a cubic B-spline window, each over the intensity range
/// of its own image. Only samples whose mapped point lands inside the moving
/// image contribute. The value is the negated mutual information so that
/// better alignment gives a lower value.
#[derive(Debug, Clone)]
pub struct MattesMutualInformation {
    num_bins: usize,
    sampling: SamplingStrategy,
    interpolation: Interpolation,
}

impl Default for MattesMutualInformation {
    fn default() -> Self {
        Self {
            num_bins: 50,
            sampling: SamplingStrategy::default(),
            interpolation: Interpolation::BSpline,
        }
    }
}

impl MattesMutualInformation {
    pub fn new(num_bins: usize) -> Result<Self> {
        validate_histogram_bins(num_bins)?;
        Ok(Self {
            num_bins,
            ..Self::default()
        })
    }

    pub fn with_sampling(mut self, sampling: SamplingStrategy) -> Result<Self> {
        sampling.validate()?;
        self.sampling = sampling;
        Ok(self)
    }

    /// Interpolator used to read the moving image.
    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    pub fn sampling(&self) -> SamplingStrategy {
        self.sampling
    }

    fn chunk_histogram<B: Backend>(
        &self,
        prepared: &MattesLevel<B>,
        fixed_values: Tensor<B, 1>,
        moving_indices: Tensor<B, 2>,
    ) -> (Tensor<B, 2>, Tensor<B, 1>) {
        let [n] = fixed_values.dims();
        let inside = inside_mask(moving_indices.clone(), prepared.moving_shape, 0.0);
        let moving_values = self
            .interpolation
            .interpolate_prepared(&prepared.moving_coefficients, moving_indices);

        let fixed_window = box_window(prepared.fixed_bins.positions(fixed_values), self.num_bins)
            * inside.clone().reshape([n, 1]);
        let moving_window = cubic_bspline_window(prepared.moving_bins.positions(moving_values), self.num_bins);

        (fixed_window.transpose().matmul(moving_window), inside.sum())
    }
}

/// Per-level state of [`MattesMutualInformation`].
#[derive(Debug, Clone)]
pub struct MattesLevel<B: Backend> {
    fixed: Image<B, 3>,
    fixed_grid: ImageGrid<3>,
    moving_grid: ImageGrid<3>,
    moving_shape: [usize; 3],
    moving_coefficients: Tensor<B, 3>,
    fixed_bins: BinMapping,
    moving_bins: BinMapping,
}

impl<B: Backend> MattesLevel<B> {
    pub fn fixed_grid(&self) -> &ImageGrid<3> {
        &self.fixed_grid
    }
}

fn intensity_range<B: Backend>(image: &Image<B, 3>, role: &str) -> Result<(f64, f64)> {
    min_max(image)
        .map(|(lo, hi)| (lo as f64, hi as f64))
        .ok_or_else(|| RegistrationError::numerical_instability(format!("{role} image has no finite intensities")))
}

impl<B: Backend> Metric<B> for MattesMutualInformation {
    type Prepared = MattesLevel<B>;

    fn prepare(&self, fixed: &Image<B, 3>, moving: &Image<B, 3>) -> Result<MattesLevel<B>> {
        let (fixed_lo, fixed_hi) = intensity_range(fixed, "fixed")?;
        let (moving_lo, moving_hi) = intensity_range(moving, "moving")?;

        Ok(MattesLevel {
            fixed: fixed.clone(),
            fixed_grid: fixed.grid(),
            moving_grid: moving.grid(),
            moving_shape: moving.shape(),
            moving_coefficients: self.interpolation.prepare(moving.data()),
            fixed_bins: BinMapping::new(fixed_lo, fixed_hi, self.num_bins),
            moving_bins: BinMapping::new(moving_lo, moving_hi, self.num_bins),
        })
    }

    fn forward<T: ParametricTransform>(
        &self,
        prepared: &MattesLevel<B>,
        transform: &T,
        parameters: Tensor<B, 1>,
        rng: &mut dyn RngCore,
    ) -> Result<Tensor<B, 1>> {
        let device = Metric::<B>::device(self, prepared);
        let fixed_shape = prepared.fixed.shape();
        let fixed_indices = self.sampling.sample_indices::<B>(fixed_shape, rng, &device);
        let [n, _] = fixed_indices.dims();

        let fixed_values = match self.sampling {
            SamplingStrategy::Full => prepared.fixed.data().clone().reshape([n]),
            SamplingStrategy::Random { .. } => LinearInterpolator.interpolate(prepared.fixed.data(), fixed_indices.clone()),
        };

        let mut joint: Option<Tensor<B, 2>> = None;
        let mut inside: Option<Tensor<B, 1>> = None;
        let mut start = 0;
        while start < n {
            let len = CHUNK_SIZE.min(n - start);
            let fixed_points = prepared
                .fixed_grid
                .index_to_world_tensor(fixed_indices.clone().narrow(0, start, len));
            let moving_points = transform.transform_points_with(parameters.clone(), fixed_points);
            let moving_indices = prepared.moving_grid.world_to_index_tensor(moving_points);

            let (chunk_joint, chunk_inside) =
                self.chunk_histogram(prepared, fixed_values.clone().narrow(0, start, len), moving_indices);
            joint = Some(match joint {
                Some(acc) => acc + chunk_joint,
                None => chunk_joint,
            });
            inside = Some(match inside {
                Some(acc) => acc + chunk_inside,
                None => chunk_inside,
            });
            start += len;
        }

        let (Some(joint), Some(inside)) = (joint, inside) else {
            return Err(RegistrationError::numerical_instability("metric evaluated on zero samples"));
        };
        let inside_count = inside.into_scalar().elem::<f64>();
        if inside_count < 1.0 {
            return Err(RegistrationError::numerical_instability(format!(
                "none of the {n} samples maps inside the moving image"
            )));
        }

        Ok(mutual_information(joint).neg())
    }

    fn device(&self, prepared: &MattesLevel<B>) -> B::Device {
        prepared.fixed.data().device()
    }

    fn name(&self) -> &'static str {
        "MattesMutualInformation"
    }
}
