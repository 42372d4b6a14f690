//! Similarity transform: versor rotation, translation and isotropic scale.

use super::trait_::{ParametricTransform, Transform};
use super::{apply_about_center, assemble_matrix, components, matrix_tensor, row_tensor};
use crate::error::{CoreError, Result};
use crate::geometry::{quaternion_scalar, quaternion_vector_to_matrix};
use crate::spatial::{Point3, Vector};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

/// `T(x) = s R(x - c) + c + t`, with `R` the rotation of a unit quaternion.
///
/// Parameters are `[vx, vy, vz, tx, ty, tz, s]`, where `v` is the vector part
/// of the quaternion; its scalar part is `sqrt(1 - |v|^2)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Similarity3DTransform {
    versor: [f64; 3],
    translation: [f64; 3],
    scale: f64,
    center: Point3,
}

impl Similarity3DTransform {
    pub const NUMBER_OF_PARAMETERS: usize = 7;

    pub fn identity(center: Point3) -> Self {
        Self {
            versor: [0.0; 3],
            translation: [0.0; 3],
            scale: 1.0,
            center,
        }
    }

    /// Build from `[vx, vy, vz, tx, ty, tz, s]`.
    pub fn from_parameters(parameters: &[f64], center: Point3) -> Result<Self> {
        Self::identity(center).with_parameters(parameters)
    }

    pub fn versor(&self) -> [f64; 3] {
        self.versor
    }

    pub fn translation(&self) -> [f64; 3] {
        self.translation
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        quaternion_vector_to_matrix(self.versor)
    }

    /// Scaled rotation matrix from a parameter tensor `[7]`.
    fn matrix_tensor_from<B: Backend>(parameters: Tensor<B, 1>) -> Tensor<B, 2> {
        let v = parameters.clone().slice([0..3]);
        let scale = parameters.slice([6..7]).reshape([1, 1]);
        let w = (v.clone().powf_scalar(2.0).sum().neg() + 1.0).clamp_min(1e-12).sqrt();
        let [x, y, z] = components(v);

        let xx = x.clone() * x.clone();
        let yy = y.clone() * y.clone();
        let zz = z.clone() * z.clone();
        let xy = x.clone() * y.clone();
        let xz = x.clone() * z.clone();
        let yz = y.clone() * z.clone();
        let xw = x * w.clone();
        let yw = y * w.clone();
        let zw = z * w;

        let rotation = assemble_matrix([
            (yy.clone() + zz.clone()) * (-2.0) + 1.0,
            (xy.clone() - zw.clone()) * 2.0,
            (xz.clone() + yw.clone()) * 2.0,
            (xy + zw) * 2.0,
            (xx.clone() + zz) * (-2.0) + 1.0,
            (yz.clone() - xw.clone()) * 2.0,
            (xz - yw) * 2.0,
            (yz + xw) * 2.0,
            (xx + yy) * (-2.0) + 1.0,
        ]);
        rotation * scale
    }
}

impl ParametricTransform for Similarity3DTransform {
    fn number_of_parameters(&self) -> usize {
        Self::NUMBER_OF_PARAMETERS
    }

    fn parameters(&self) -> Vec<f64> {
        let mut p = Vec::with_capacity(Self::NUMBER_OF_PARAMETERS);
        p.extend_from_slice(&self.versor);
        p.extend_from_slice(&self.translation);
        p.push(self.scale);
        p
    }

    fn with_parameters(&self, parameters: &[f64]) -> Result<Self> {
        if parameters.len() != Self::NUMBER_OF_PARAMETERS {
            return Err(CoreError::invalid_parameter(
                "parameters",
                format!("Similarity3D expects 7 values, got {}", parameters.len()),
            ));
        }
        let versor = [parameters[0], parameters[1], parameters[2]];
        let norm_squared: f64 = versor.iter().map(|v| v * v).sum();
        if norm_squared > 1.0 + 1e-9 {
            return Err(CoreError::invalid_parameter(
                "versor",
                format!("vector part norm {:.6} exceeds 1", norm_squared.sqrt()),
            ));
        }
        let scale = parameters[6];
        if !(scale.is_finite() && scale > 0.0) {
            return Err(CoreError::invalid_parameter("scale", format!("must be positive, got {scale}")));
        }
        Ok(Self {
            versor,
            translation: [parameters[3], parameters[4], parameters[5]],
            scale,
            center: self.center,
        })
    }

    fn center(&self) -> Point3 {
        self.center
    }

    fn transform_point(&self, point: &Point3) -> Point3 {
        let rotated = Vector(self.rotation_matrix() * (*point - self.center).0) * self.scale;
        self.center + rotated + Vector::new(self.translation)
    }

    fn transform_points_with<B: Backend>(&self, parameters: Tensor<B, 1>, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = points.device();
        let translation = parameters.clone().slice([3..6]).reshape([1, 3]);
        let matrix = Self::matrix_tensor_from(parameters);
        apply_about_center(points, matrix, row_tensor(self.center.to_array(), &device), translation)
    }
}

impl<B: Backend> Transform<B, 3> for Similarity3DTransform {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = points.device();
        apply_about_center(
            points,
            matrix_tensor(&(self.rotation_matrix() * self.scale), &device),
            row_tensor(self.center.to_array(), &device),
            row_tensor(self.translation, &device),
        )
    }
}

impl std::fmt::Display for Similarity3DTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Similarity3D(versor={:?} (w={:.4}), translation={:?}, scale={:.4}, center={:?})",
            self.versor,
            quaternion_scalar(self.versor),
            self.translation,
            self.scale,
            self.center.to_array()
        )
    }
}
