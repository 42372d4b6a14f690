//! Cubic B-spline interpolation.
//!
//! `prepare` turns voxel values into spline coefficients with the recursive
//! prefilter (pole `sqrt(3) - 2`, mirror boundaries) so that the spline passes
//! through every voxel value. Evaluation gathers the 4x4x4 coefficient support
//! of each sample and weights it with the cubic basis, all in tensor ops.

use super::trait_::Interpolator;
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};
use ndarray::{Array3, ArrayViewMut1, Axis, Zip};

const POLE: f64 = -0.267_949_192_431_122_7; // sqrt(3) - 2
const PREFILTER_TOLERANCE: f64 = 1e-10;

#[derive(Debug, Clone, Copy, Default)]
pub struct BSplineInterpolator;

impl BSplineInterpolator {
    pub fn new() -> Self {
        Self
    }

    /// Mirrored integer indices and cubic weights of the four samples around `x`.
    fn axis_support<B: Backend>(x: Tensor<B, 1>, n: usize) -> ([Tensor<B, 1, Int>; 4], [Tensor<B, 1>; 4]) {
        let base = x.clone().floor();
        let t = x - base.clone();
        let t2 = t.clone() * t.clone();
        let t3 = t2.clone() * t.clone();
        let one_minus_t = t.clone().neg() + 1.0;

        let w0 = one_minus_t.clone() * one_minus_t.clone() * one_minus_t / 6.0;
        let w1 = t3.clone() * 0.5 - t2.clone() + 2.0 / 3.0;
        let w2 = t3.clone() * (-0.5) + t2 * 0.5 + t * 0.5 + 1.0 / 6.0;
        let w3 = t3 / 6.0;

        let last = n as f64 - 1.0;
        let mirror = |offset: f64| -> Tensor<B, 1, Int> {
            let i = base.clone() + offset;
            // last - |last - |i||
            let m = (i.abs().neg() + last).abs().neg() + last;
            m.clamp(0.0, last.max(0.0)).int()
        };

        (
            [mirror(-1.0), mirror(0.0), mirror(1.0), mirror(2.0)],
            [w0, w1, w2, w3],
        )
    }
}

/// Spline coefficients of a `[d, h, w]` volume given in memory order.
fn spline_coefficients(values: Vec<f32>, shape: [usize; 3]) -> Result<Vec<f32>, String> {
    let [d, h, w] = shape;
    let mut volume = Array3::from_shape_vec((d, h, w), values).map_err(|e| e.to_string())?;
    prefilter_volume(&mut volume);
    Ok(volume.into_raw_vec())
}

impl<B: Backend> Interpolator<B> for BSplineInterpolator {
    /// Falls back to the raw voxel values, with a warning, when the volume
    /// cannot be read back from the device.
    fn prepare(&self, data: &Tensor<B, 3>) -> Tensor<B, 3> {
        let shape = data.dims();
        let coefficients = data
            .clone()
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| format!("{e:?}"))
            .and_then(|values| spline_coefficients(values, shape));
        match coefficients {
            Ok(coefficients) => {
                let [d, h, w] = shape;
                Tensor::<B, 1>::from_data(TensorData::new(coefficients, [d * h * w]), &data.device()).reshape(shape)
            }
            Err(reason) => {
                tracing::warn!(?shape, %reason, "B-spline prefilter skipped, interpolating raw values");
                data.clone()
            }
        }
    }

    fn interpolate_prepared(&self, coefficients: &Tensor<B, 3>, indices: Tensor<B, 2>) -> Tensor<B, 1> {
        let [d0, d1, d2] = coefficients.dims();
        let flat = coefficients.clone().reshape([d0 * d1 * d2]);

        let x = indices.clone().narrow(1, 0, 1).squeeze::<1>(1);
        let y = indices.clone().narrow(1, 1, 1).squeeze::<1>(1);
        let z = indices.narrow(1, 2, 1).squeeze::<1>(1);

        let (xi, wx) = Self::axis_support(x, d2);
        let (yi, wy) = Self::axis_support(y, d1);
        let (zi, wz) = Self::axis_support(z, d0);

        let stride_z = (d1 * d2) as i32;
        let stride_y = d2 as i32;

        let mut acc: Option<Tensor<B, 1>> = None;
        for c in 0..4 {
            let z_offset = zi[c].clone() * stride_z;
            for b in 0..4 {
                let row_offset = z_offset.clone() + yi[b].clone() * stride_y;
                let mut row: Option<Tensor<B, 1>> = None;
                for a in 0..4 {
                    let v = flat.clone().gather(0, row_offset.clone() + xi[a].clone()) * wx[a].clone();
                    row = Some(match row {
                        Some(r) => r + v,
                        None => v,
                    });
                }
                if let Some(row) = row {
                    let term = row * (wz[c].clone() * wy[b].clone());
                    acc = Some(match acc {
                        Some(total) => total + term,
                        None => term,
                    });
                }
            }
        }
        acc.unwrap_or_else(|| wx[0].clone().zeros_like())
    }
}

/// Replace voxel values by cubic spline coefficients along every axis.
pub fn prefilter_volume(volume: &mut Array3<f32>) {
    for axis in 0..3 {
        Zip::from(volume.lanes_mut(Axis(axis))).par_for_each(|lane| prefilter_lane(lane));
    }
}

fn prefilter_lane(mut lane: ArrayViewMut1<f32>) {
    let n = lane.len();
    if n < 2 {
        return;
    }
    let z = POLE;
    let lambda = (1.0 - z) * (1.0 - 1.0 / z);
    let mut c: Vec<f64> = lane.iter().map(|v| *v as f64 * lambda).collect();

    c[0] = causal_initial_value(&c, z);
    for k in 1..n {
        c[k] += z * c[k - 1];
    }

    c[n - 1] = (z / (z * z - 1.0)) * (z * c[n - 2] + c[n - 1]);
    for k in (0..n - 1).rev() {
        c[k] = z * (c[k + 1] - c[k]);
    }

    for (dst, src) in lane.iter_mut().zip(c) {
        *dst = src as f32;
    }
}

fn causal_initial_value(c: &[f64], z: f64) -> f64 {
    let n = c.len();
    let horizon = (PREFILTER_TOLERANCE.ln() / z.abs().ln()).ceil() as usize;
    if horizon < n {
        let mut zn = z;
        let mut sum = c[0];
        for value in c.iter().take(horizon).skip(1) {
            sum += zn * value;
            zn *= z;
        }
        sum
    } else {
        // exact mirror-symmetric initialization
        let iz = 1.0 / z;
        let mut zn = z;
        let mut z2n = z.powi(n as i32 - 1);
        let mut sum = c[0] + z2n * c[n - 1];
        z2n *= z2n * iz;
        for value in c.iter().take(n - 1).skip(1) {
            sum += (zn + z2n) * value;
            zn *= z;
            z2n *= iz;
        }
        sum / (1.0 - zn * zn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    fn volume(device: &<B as Backend>::Device, shape: [usize; 3], f: impl Fn(usize, usize, usize) -> f32) -> Tensor<B, 3> {
        let [d, h, w] = shape;
        let mut values = Vec::with_capacity(d * h * w);
        for z in 0..d {
            for y in 0..h {
                for x in 0..w {
                    values.push(f(x, y, z));
                }
            }
        }
        Tensor::<B, 1>::from_data(TensorData::new(values, [d * h * w]), device).reshape(shape)
    }

    #[test]
    fn test_coefficients_of_constant_volume() {
        let coefficients = spline_coefficients(vec![2.5; 60], [3, 4, 5]).unwrap();
        assert_eq!(coefficients.len(), 60);
        assert!(coefficients.iter().all(|c| (c - 2.5).abs() < 1e-4));
    }

    #[test]
    fn test_coefficients_reject_wrong_length() {
        assert!(spline_coefficients(vec![1.0; 10], [2, 2, 2]).is_err());
    }

    #[test]
    fn test_interpolates_voxel_values_exactly() {
        let device = Default::default();
        let shape = [4, 5, 6];
        let data = volume(&device, shape, |x, y, z| ((x * 7 + y * 3 + z * 11) % 13) as f32);
        let grid = crate::image::generate_index_grid::<B>(shape, &device);

        let sampled = BSplineInterpolator.interpolate(&data, grid).into_data().to_vec::<f32>().unwrap();
        let expected = data.into_data().to_vec::<f32>().unwrap();
        for (s, e) in sampled.iter().zip(expected.iter()) {
            assert!((s - e).abs() < 1e-3, "{s} vs {e}");
        }
    }

    #[test]
    fn test_constant_volume_stays_constant() {
        let device = Default::default();
        let data = volume(&device, [3, 3, 3], |_, _, _| 4.0);
        let indices = Tensor::<B, 2>::from_data(
            TensorData::new(vec![0.3f32, 1.7, 0.2, 2.4, 0.0, 1.9, -0.4, 2.2, 1.0], [3, 3]),
            &device,
        );
        let values = BSplineInterpolator.interpolate(&data, indices).into_data().to_vec::<f32>().unwrap();
        for v in values {
            assert!((v - 4.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_smooth_between_samples() {
        let device = Default::default();
        // a ramp along x evaluated in the interior stays close to linear
        let data = volume(&device, [1, 1, 16], |x, _, _| x as f32);
        let indices = Tensor::<B, 2>::from_data(TensorData::new(vec![7.5f32, 0.0, 0.0], [1, 3]), &device);
        let value = BSplineInterpolator.interpolate(&data, indices).into_data().to_vec::<f32>().unwrap()[0];
        assert!((value - 7.5).abs() < 1e-2);
    }

    #[test]
    fn test_single_sample_lane_is_untouched() {
        let mut volume = Array3::from_elem((1, 1, 1), 2.5f32);
        prefilter_volume(&mut volume);
        assert_eq!(volume[[0, 0, 0]], 2.5);
    }
}
