//! Parzen-window joint histograms for mutual information.
//!
//! Intensities are mapped to continuous bin positions, then spread over the
//! bins with a window: a box for the fixed image and a cubic B-spline for the
//! moving image. The joint histogram of `N` samples is `Wf^T Wm` with the
//! `[N, bins]` window matrices, which keeps the whole estimate differentiable
//! with respect to the moving intensities.

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

/// Bins reserved at each end of the histogram for the window support.
pub const PADDING_BINS: usize = 2;

/// Affine map from an intensity range onto histogram bin positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinMapping {
    pub min_intensity: f64,
    pub bin_size: f64,
    pub num_bins: usize,
}

impl BinMapping {
    /// Spread `[min, max]` over the bins between the padding.
    pub fn new(min_intensity: f64, max_intensity: f64, num_bins: usize) -> Self {
        let usable = num_bins.saturating_sub(2 * PADDING_BINS).max(1) as f64;
        let width = (max_intensity - min_intensity).max(f64::EPSILON);
        Self {
            min_intensity,
            bin_size: width / usable,
            num_bins,
        }
    }

    /// Continuous bin position of each intensity, clamped to the padded range.
    pub fn positions<B: Backend>(&self, values: Tensor<B, 1>) -> Tensor<B, 1> {
        let lo = PADDING_BINS as f64;
        let hi = (self.num_bins - PADDING_BINS) as f64 - 1e-3;
        ((values - self.min_intensity) / self.bin_size + lo).clamp(lo, hi)
    }
}

fn bin_row<B: Backend>(num_bins: usize, device: &B::Device) -> Tensor<B, 2> {
    Tensor::<B, 1, Int>::arange(0..num_bins as i64, device)
        .float()
        .reshape([1, num_bins])
}

/// Zero-order window: one-hot rows at `floor(position)`.
pub fn box_window<B: Backend>(positions: Tensor<B, 1>, num_bins: usize) -> Tensor<B, 2> {
    let [n] = positions.dims();
    let device = positions.device();
    let bins = positions.floor().reshape([n, 1]);
    (bins - bin_row::<B>(num_bins, &device)).abs().clamp_max(1.0).neg() + 1.0
}

/// Cubic B-spline window centred on each position.
pub fn cubic_bspline_window<B: Backend>(positions: Tensor<B, 1>, num_bins: usize) -> Tensor<B, 2> {
    let [n] = positions.dims();
    let device = positions.device();
    let u = (bin_row::<B>(num_bins, &device) - positions.reshape([n, 1])).abs();

    let u2 = u.clone() * u.clone();
    let u3 = u2.clone() * u.clone();
    // |u| < 1: 2/3 - u^2 + |u|^3 / 2
    let near = u3 * 0.5 - u2 + 2.0 / 3.0;
    // 1 <= |u| < 2: (2 - |u|)^3 / 6
    let far_base = u.clone().neg() + 2.0;
    let far = far_base.clone() * far_base.clone() * far_base / 6.0;

    let near_mask = u.clone().lower_elem(1.0).float();
    let far_mask = u.clone().greater_equal_elem(1.0).float() * u.lower_elem(2.0).float();
    near * near_mask + far * far_mask
}

/// Mutual information of a joint histogram (unnormalized counts allowed).
pub fn mutual_information<B: Backend>(joint: Tensor<B, 2>) -> Tensor<B, 1> {
    let eps = 1e-10;
    let total = joint.clone().sum() + eps;
    let p = joint / total.reshape([1, 1]);

    let p_fixed = p.clone().sum_dim(1);
    let p_moving = p.clone().sum_dim(0);

    let log_ratio = (p.clone() + eps).log() - (p_fixed + eps).log() - (p_moving + eps).log();
    (p * log_ratio).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::TensorData;
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    fn tensor(values: Vec<f32>) -> Tensor<B, 1> {
        let n = values.len();
        Tensor::from_data(TensorData::new(values, [n]), &Default::default())
    }

    #[test]
    fn test_bin_mapping_uses_inner_bins() {
        let mapping = BinMapping::new(0.0, 46.0, 50);
        assert!((mapping.bin_size - 1.0).abs() < 1e-12);
        let pos = mapping.positions(tensor(vec![0.0, 10.0, 46.0, -5.0])).into_data().to_vec::<f32>().unwrap();
        assert!((pos[0] - 2.0).abs() < 1e-5);
        assert!((pos[1] - 12.0).abs() < 1e-5);
        assert!(pos[2] < 48.0 && pos[2] > 47.99);
        assert!((pos[3] - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_box_window_is_one_hot() {
        let w = box_window(tensor(vec![2.3, 7.9]), 10).into_data().to_vec::<f32>().unwrap();
        assert_eq!(w.iter().sum::<f32>(), 2.0);
        assert_eq!(w[2], 1.0);
        assert_eq!(w[10 + 7], 1.0);
    }

    #[test]
    fn test_bspline_window_is_partition_of_unity() {
        let w = cubic_bspline_window(tensor(vec![5.0, 5.25, 12.5]), 20).into_data().to_vec::<f32>().unwrap();
        for row in w.chunks(20) {
            assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-5);
            assert!(row.iter().all(|&v| v >= 0.0));
        }
        // centred on a bin: 1/6, 2/3, 1/6
        assert!((w[4] - 1.0 / 6.0).abs() < 1e-6);
        assert!((w[5] - 2.0 / 3.0).abs() < 1e-6);
        assert!((w[6] - 1.0 / 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_mutual_information_of_independent_and_identical() {
        let device = Default::default();
        // uniform product distribution: MI = 0
        let independent = Tensor::<B, 2>::ones([4, 4], &device);
        let mi = mutual_information(independent).into_scalar();
        assert!(mi.abs() < 1e-5);

        // diagonal joint over 4 states: MI = ln 4
        let diagonal = Tensor::<B, 2>::from_data(
            TensorData::new(
                vec![1.0f32, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0],
                [4, 4],
            ),
            &device,
        );
        let mi = mutual_information(diagonal).into_scalar();
        assert!((mi - 4f32.ln()).abs() < 1e-4);
    }
}
