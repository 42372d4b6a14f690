//! Physical distance between adjacent voxels along each axis.

use super::Vector;

/// Voxel spacing along each axis, in physical units.
pub type Spacing<const D: usize> = Vector<D>;

impl<const D: usize> Spacing<D> {
    pub fn uniform(value: f64) -> Self {
        Self::new([value; D])
    }

    pub fn is_uniform(&self) -> bool {
        (1..D).all(|i| (self[i] - self[0]).abs() < 1e-9)
    }

    /// True when every component is finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        (0..D).all(|i| self[i].is_finite() && self[i] > 0.0)
    }

    pub fn min_spacing(&self) -> f64 {
        (0..D).map(|i| self[i]).fold(f64::INFINITY, f64::min)
    }

    pub fn max_spacing(&self) -> f64 {
        (0..D).map(|i| self[i]).fold(f64::NEG_INFINITY, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Spacing3 = Spacing<3>;

    #[test]
    fn test_spacing_uniform() {
        assert!(Spacing3::uniform(1.0).is_uniform());
        assert!(!Spacing3::new([1.0, 1.0, 2.0]).is_uniform());
    }

    #[test]
    fn test_spacing_validity() {
        assert!(Spacing3::new([0.5, 1.0, 2.0]).is_valid());
        assert!(!Spacing3::new([0.0, 1.0, 2.0]).is_valid());
        assert!(!Spacing3::new([1.0, f64::NAN, 2.0]).is_valid());
    }

    #[test]
    fn test_spacing_min_max() {
        let s = Spacing3::new([1.0, 2.0, 3.0]);
        assert_eq!(s.min_spacing(), 1.0);
        assert_eq!(s.max_spacing(), 3.0);
    }
}
