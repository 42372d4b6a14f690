//! Positions in physical space.

use super::Vector;
use nalgebra::Point as NaPoint;
use serde::{Deserialize, Serialize};

/// A point in D-dimensional physical space (millimetres for scanner data).
///
/// Used for image origins, transform centers and sampled physical positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point<const D: usize>(pub NaPoint<f64, D>);

impl<const D: usize> Point<D> {
    pub fn new(coords: [f64; D]) -> Self {
        Self(NaPoint::from(coords))
    }

    pub fn origin() -> Self {
        Self(NaPoint::origin())
    }

    /// Build a point from a slice, returning `None` when the length is not `D`.
    pub fn from_slice(coords: &[f64]) -> Option<Self> {
        if coords.len() != D {
            return None;
        }
        let mut point = Self::origin();
        for (i, c) in coords.iter().enumerate() {
            point.0.coords[i] = *c;
        }
        Some(point)
    }

    pub fn to_array(&self) -> [f64; D] {
        let mut out = [0.0; D];
        for (i, o) in out.iter_mut().enumerate() {
            *o = self.0.coords[i];
        }
        out
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.0.coords.iter().copied().collect()
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Self) -> f64 {
        nalgebra::distance(&self.0, &other.0)
    }

    pub fn inner(&self) -> &NaPoint<f64, D> {
        &self.0
    }
}

impl<const D: usize> std::ops::Index<usize> for Point<D> {
    type Output = f64;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0.coords[index]
    }
}

impl<const D: usize> std::ops::IndexMut<usize> for Point<D> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0.coords[index]
    }
}

impl<const D: usize> std::ops::Sub for Point<D> {
    type Output = Vector<D>;

    fn sub(self, other: Self) -> Self::Output {
        Vector(self.0.coords - other.0.coords)
    }
}

impl<const D: usize> std::ops::Add<Vector<D>> for Point<D> {
    type Output = Self;

    fn add(self, vector: Vector<D>) -> Self::Output {
        Self(self.0 + vector.0)
    }
}

impl<const D: usize> std::ops::Sub<Vector<D>> for Point<D> {
    type Output = Self;

    fn sub(self, vector: Vector<D>) -> Self::Output {
        Self(self.0 - vector.0)
    }
}
