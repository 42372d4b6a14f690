//! Rotation algebra and random transform parameters.
//!
//! Euler angles follow the ZYX convention everywhere in the crate:
//! `R = Rz(az) * Ry(ay) * Rx(ax)`. Quaternions are stored as their vector part
//! `(x, y, z)`; the scalar part is implied by unit norm.

use nalgebra::{Matrix3, Vector3};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// `|qs|` below this value switches quaternion extraction to the pivoted formula.
pub const DEFAULT_QUATERNION_TOLERANCE: f64 = 1e-8;

/// Number of values produced by [`random_similarity_parameters`].
pub const SIMILARITY_PARAMETER_COUNT: usize = 7;

/// Rotation matrix for intrinsic Z, then Y, then X rotations.
pub fn euler_zyx_matrix(ax: f64, ay: f64, az: f64) -> Matrix3<f64> {
    let (sx, cx) = ax.sin_cos();
    let (sy, cy) = ay.sin_cos();
    let (sz, cz) = az.sin_cos();

    Matrix3::new(
        cz * cy,
        cz * sy * sx - sz * cx,
        cz * sy * cx + sz * sx,
        sz * cy,
        sz * sy * sx + cz * cx,
        sz * sy * cx - cz * sx,
        -sy,
        cy * sx,
        cy * cx,
    )
}

/// Vector part of the unit quaternion equivalent to the ZYX Euler rotation.
///
/// When the scalar part `qs = sqrt(trace + 1) / 2` is within `tolerance` of
/// zero the rotation is close to 180 degrees and the direct formula divides by
/// almost nothing, so the components are recovered from the largest diagonal
/// entry instead.
pub fn euler_to_quaternion_vector(ax: f64, ay: f64, az: f64, tolerance: f64) -> [f64; 3] {
    let r = euler_zyx_matrix(ax, ay, az);
    let trace = r[(0, 0)] + r[(1, 1)] + r[(2, 2)];
    let qs = 0.5 * (trace + 1.0).max(0.0).sqrt();

    let mut qv = [0.0; 3];
    if qs.abs() <= tolerance {
        let diagonal = [r[(0, 0)], r[(1, 1)], r[(2, 2)]];
        let i = (0..3).fold(0, |best, k| if diagonal[k] > diagonal[best] { k } else { best });
        let j = (i + 1) % 3;
        let k = (j + 1) % 3;
        let w = (r[(i, i)] - r[(j, j)] - r[(k, k)] + 1.0).max(0.0).sqrt();
        qv[i] = 0.5 * w;
        qv[j] = (r[(i, j)] + r[(j, i)]) / (2.0 * w);
        qv[k] = (r[(i, k)] + r[(k, i)]) / (2.0 * w);
    } else {
        let denom = 4.0 * qs;
        qv[0] = (r[(2, 1)] - r[(1, 2)]) / denom;
        qv[1] = (r[(0, 2)] - r[(2, 0)]) / denom;
        qv[2] = (r[(1, 0)] - r[(0, 1)]) / denom;
    }
    qv
}

/// Implied scalar part of a unit quaternion given its vector part.
pub fn quaternion_scalar(v: [f64; 3]) -> f64 {
    (1.0 - Vector3::from(v).norm_squared()).max(0.0).sqrt()
}

/// Rotation matrix of the unit quaternion whose vector part is `v`.
pub fn quaternion_vector_to_matrix(v: [f64; 3]) -> Matrix3<f64> {
    let [x, y, z] = v;
    let w = quaternion_scalar(v);

    Matrix3::new(
        1.0 - 2.0 * (y * y + z * z),
        2.0 * (x * y - z * w),
        2.0 * (x * z + y * w),
        2.0 * (x * y + z * w),
        1.0 - 2.0 * (x * x + z * z),
        2.0 * (y * z - x * w),
        2.0 * (x * z - y * w),
        2.0 * (y * z + x * w),
        1.0 - 2.0 * (x * x + y * y),
    )
}

/// A closed sampling interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub min: f64,
    pub max: f64,
}

impl Interval {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub const fn symmetric(half_width: f64) -> Self {
        Self::new(-half_width, half_width)
    }

    /// Uniform draw `min + (max - min) * u` with `u` in `[0, 1)`.
    pub fn sample(&self, rng: &mut dyn RngCore) -> f64 {
        self.min + (self.max - self.min) * rng.gen::<f64>()
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min.min(self.max) && value <= self.max.max(self.min)
    }
}

/// Sampling ranges for a random similarity transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityRanges {
    /// Rotation angles about x, y and z, in radians.
    pub angles: [Interval; 3],
    /// Translation along x, y and z, in physical units.
    pub translation: [Interval; 3],
    pub scale: Interval,
}

impl Default for SimilarityRanges {
    fn default() -> Self {
        Self {
            angles: [Interval::symmetric(PI / 18.0); 3],
            translation: [Interval::symmetric(2.0); 3],
            scale: Interval::new(0.9, 1.3),
        }
    }
}

impl SimilarityRanges {
    pub fn with_angles(mut self, angles: Interval) -> Self {
        self.angles = [angles; 3];
        self
    }

    pub fn with_translation(mut self, translation: Interval) -> Self {
        self.translation = [translation; 3];
        self
    }

    pub fn with_scale(mut self, scale: Interval) -> Self {
        self.scale = scale;
        self
    }
}

/// Sampling ranges for radial distortion coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadialDistortionRanges {
    pub k1: Interval,
    pub k2: Interval,
    pub k3: Interval,
}

impl Default for RadialDistortionRanges {
    fn default() -> Self {
        Self {
            k1: Interval::new(1e-7, 1e-5),
            k2: Interval::new(1e-15, 1e-12),
            k3: Interval::new(1e-15, 1e-12),
        }
    }
}

/// Draw similarity parameters `[qx, qy, qz, tx, ty, tz, scale]`.
///
/// Angles are drawn first (x, y, z), then translations, then the scale, and
/// the angles are converted to a quaternion vector.
pub fn random_similarity_parameters(
    ranges: &SimilarityRanges,
    rng: &mut dyn RngCore,
) -> [f64; SIMILARITY_PARAMETER_COUNT] {
    let ax = ranges.angles[0].sample(rng);
    let ay = ranges.angles[1].sample(rng);
    let az = ranges.angles[2].sample(rng);

    let tx = ranges.translation[0].sample(rng);
    let ty = ranges.translation[1].sample(rng);
    let tz = ranges.translation[2].sample(rng);

    let scale = ranges.scale.sample(rng);

    let [qx, qy, qz] = euler_to_quaternion_vector(ax, ay, az, DEFAULT_QUATERNION_TOLERANCE);
    [qx, qy, qz, tx, ty, tz, scale]
}

/// Draw radial distortion coefficients `(k1, k2, k3)`.
pub fn random_radial_distortion_coefficients(
    ranges: &RadialDistortionRanges,
    rng: &mut dyn RngCore,
) -> (f64, f64, f64) {
    let k1 = ranges.k1.sample(rng);
    let k2 = ranges.k2.sample(rng);
    let k3 = ranges.k3.sample(rng);
    (k1, k2, k3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn assert_matrix_close(a: &Matrix3<f64>, b: &Matrix3<f64>, tol: f64) {
        for r in 0..3 {
            for c in 0..3 {
                assert!(
                    (a[(r, c)] - b[(r, c)]).abs() < tol,
                    "entry ({r},{c}): {} vs {}",
                    a[(r, c)],
                    b[(r, c)]
                );
            }
        }
    }

    #[test]
    fn test_identity_rotation() {
        let qv = euler_to_quaternion_vector(0.0, 0.0, 0.0, DEFAULT_QUATERNION_TOLERANCE);
        assert_eq!(qv, [0.0, 0.0, 0.0]);
        assert_matrix_close(&quaternion_vector_to_matrix(qv), &Matrix3::identity(), 1e-12);
    }

    #[test]
    fn test_rotation_about_z() {
        let angle = PI / 2.0;
        let qv = euler_to_quaternion_vector(0.0, 0.0, angle, DEFAULT_QUATERNION_TOLERANCE);
        assert!(qv[0].abs() < 1e-12);
        assert!(qv[1].abs() < 1e-12);
        assert!((qv[2] - (angle / 2.0).sin()).abs() < 1e-12);
    }

    #[test]
    fn test_half_turn_uses_pivot_branch() {
        // Rx(pi) has trace -1, so the scalar part is zero.
        let (ax, ay, az) = (PI, 0.0, 0.0);
        let qv = euler_to_quaternion_vector(ax, ay, az, DEFAULT_QUATERNION_TOLERANCE);
        assert!((qv[0].abs() - 1.0).abs() < 1e-12);
        assert!(qv[1].abs() < 1e-12);
        assert!(qv[2].abs() < 1e-12);
        assert_matrix_close(&quaternion_vector_to_matrix(qv), &euler_zyx_matrix(ax, ay, az), 1e-9);
    }

    #[test]
    fn test_half_turn_about_oblique_axis() {
        // Rz(pi) * Ry(pi) * Rx(0) is a half turn about x as well; Rz(pi/2)Rx(pi) is a half turn about (1,1,0)/sqrt(2).
        for (ax, ay, az) in [(0.0, PI, PI), (PI, 0.0, PI / 2.0), (0.0, PI, 0.0)] {
            let r = euler_zyx_matrix(ax, ay, az);
            assert!((r.trace() + 1.0).abs() < 1e-9);
            let qv = euler_to_quaternion_vector(ax, ay, az, DEFAULT_QUATERNION_TOLERANCE);
            assert_matrix_close(&quaternion_vector_to_matrix(qv), &r, 1e-9);
        }
    }

    #[test]
    fn test_random_similarity_parameters_within_ranges() {
        let mut rng = StdRng::seed_from_u64(7);
        let ranges = SimilarityRanges::default();
        for _ in 0..100 {
            let p = random_similarity_parameters(&ranges, &mut rng);
            // |v| = sin(theta / 2) stays small for rotations of at most ~17 degrees
            let norm = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
            assert!(norm < 0.16);
            for t in &p[3..6] {
                assert!((-2.0..=2.0).contains(t));
            }
            assert!(ranges.scale.contains(p[6]));
        }
    }

    #[test]
    fn test_random_parameters_are_reproducible_with_a_seed() {
        let ranges = SimilarityRanges::default();
        let a = random_similarity_parameters(&ranges, &mut StdRng::seed_from_u64(42));
        let b = random_similarity_parameters(&ranges, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_radial_distortion_coefficients_within_ranges() {
        let mut rng = StdRng::seed_from_u64(3);
        let ranges = RadialDistortionRanges::default();
        for _ in 0..50 {
            let (k1, k2, k3) = random_radial_distortion_coefficients(&ranges, &mut rng);
            assert!((1e-7..=1e-5).contains(&k1));
            assert!((1e-15..=1e-12).contains(&k2));
            assert!((1e-15..=1e-12).contains(&k3));
        }
    }

    #[test]
    fn test_degenerate_interval() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(Interval::new(1.5, 1.5).sample(&mut rng), 1.5);
    }
}
