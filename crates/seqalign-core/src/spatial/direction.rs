//! Orientation of image axes in physical space.

use super::Vector;
use nalgebra::SMatrix;
use serde::{Deserialize, Serialize};

/// Direction cosine matrix of an image.
///
/// Column `i` holds the physical direction of image axis `i`. The diagonal is
/// what scan selection calls the orientation vector: a volume acquired as an
/// axial stack has all three diagonal entries close to one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Direction<const D: usize>(pub SMatrix<f64, D, D>);

impl<const D: usize> Direction<D> {
    pub fn identity() -> Self {
        Self(SMatrix::identity())
    }

    /// Build from row-major entries, the layout DICOM and NIfTI headers use.
    pub fn from_row_major(rows: [[f64; D]; D]) -> Self {
        let mut m = SMatrix::<f64, D, D>::zeros();
        for (r, row) in rows.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                m[(r, c)] = *v;
            }
        }
        Self(m)
    }

    pub fn is_orthogonal(&self) -> bool {
        let product = self.0 * self.0.transpose();
        (0..D).all(|i| {
            (0..D).all(|j| {
                let expected = if i == j { 1.0 } else { 0.0 };
                (product[(i, j)] - expected).abs() < 1e-6
            })
        })
    }

    /// Cofactor expansion for 2x2 and 3x3, partial-pivot elimination above.
    pub fn determinant(&self) -> f64 {
        let m = &self.0;
        match D {
            0 => 1.0,
            1 => m[(0, 0)],
            2 => m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)],
            3 => {
                m[(0, 0)] * (m[(1, 1)] * m[(2, 2)] - m[(1, 2)] * m[(2, 1)])
                    - m[(0, 1)] * (m[(1, 0)] * m[(2, 2)] - m[(1, 2)] * m[(2, 0)])
                    + m[(0, 2)] * (m[(1, 0)] * m[(2, 1)] - m[(1, 1)] * m[(2, 0)])
            }
            _ => {
                let mut a = *m;
                let mut det = 1.0;
                for col in 0..D {
                    let pivot = (col..D)
                        .max_by(|&r, &s| a[(r, col)].abs().total_cmp(&a[(s, col)].abs()))
                        .unwrap_or(col);
                    if a[(pivot, col)] == 0.0 {
                        return 0.0;
                    }
                    if pivot != col {
                        a.swap_rows(pivot, col);
                        det = -det;
                    }
                    let p = a[(col, col)];
                    det *= p;
                    for row in col + 1..D {
                        let factor = a[(row, col)] / p;
                        for k in col..D {
                            let v = a[(col, k)];
                            a[(row, k)] -= factor * v;
                        }
                    }
                }
                det
            }
        }
    }

    pub fn try_inverse(&self) -> Option<Self> {
        self.0.try_inverse().map(Self)
    }

    pub fn transpose(&self) -> Self {
        Self(self.0.transpose())
    }

    /// The diagonal entries `(d00, d11, d22, ...)`.
    pub fn diagonal(&self) -> [f64; D] {
        let mut out = [0.0; D];
        for (i, o) in out.iter_mut().enumerate() {
            *o = self.0[(i, i)];
        }
        out
    }

    pub fn inner(&self) -> &SMatrix<f64, D, D> {
        &self.0
    }
}

impl<const D: usize> std::ops::Index<(usize, usize)> for Direction<D> {
    type Output = f64;

    fn index(&self, index: (usize, usize)) -> &Self::Output {
        &self.0[index]
    }
}

impl<const D: usize> std::ops::IndexMut<(usize, usize)> for Direction<D> {
    fn index_mut(&mut self, index: (usize, usize)) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl<const D: usize> std::ops::Mul for Direction<D> {
    type Output = Self;

    fn mul(self, other: Self) -> Self::Output {
        Self(self.0 * other.0)
    }
}

impl<const D: usize> std::ops::Mul<Vector<D>> for Direction<D> {
    type Output = Vector<D>;

    fn mul(self, vector: Vector<D>) -> Self::Output {
        Vector(self.0 * vector.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Direction3 = Direction<3>;

    #[test]
    fn test_rotation_about_z_is_orthogonal() {
        let rot = Direction3::from_row_major([[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]);
        assert!(rot.is_orthogonal());
        assert!((rot.determinant() - 1.0).abs() < 1e-12);
        assert_eq!(rot.diagonal(), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_reflection_has_negative_determinant() {
        let mut reflection = Direction3::identity();
        reflection[(0, 0)] = -1.0;
        assert!(reflection.is_orthogonal());
        assert!((reflection.determinant() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_determinant_of_scaled_axes() {
        let scaled = Direction3::from_row_major([[2.0, 0.0, 0.0], [0.0, 3.0, 0.0], [1.0, 0.0, 0.5]]);
        assert!((scaled.determinant() - 3.0).abs() < 1e-12);
        let planar = Direction::<2>::from_row_major([[0.0, 1.0], [1.0, 0.0]]);
        assert!((planar.determinant() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_determinant_by_elimination() {
        let m = Direction::<4>::from_row_major([
            [0.0, 2.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 3.0, 1.0],
            [0.0, 0.0, 1.0, 1.0],
        ]);
        // row swap (-1) * 2 * 1 * (3 - 1)
        assert!((m.determinant() + 4.0).abs() < 1e-12);
        assert_eq!(Direction::<4>::identity().determinant(), 1.0);
    }

    #[test]
    fn test_inverse_of_orthogonal_is_transpose() {
        let rot = Direction3::from_row_major([[0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        let inv = rot.try_inverse().expect("orthogonal matrix is invertible");
        assert_eq!(inv, rot.transpose());
    }
}
