//! Rigid transform parameterized by ZYX Euler angles.

use super::trait_::{ParametricTransform, Transform};
use super::{apply_about_center, assemble_matrix, components, matrix_tensor, row_tensor};
use crate::error::{CoreError, Result};
use crate::geometry::euler_zyx_matrix;
use crate::spatial::{Point3, Vector};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

/// Rotation about a fixed center followed by a translation:
/// `T(x) = R(x - c) + c + t` with `R = Rz Ry Rx`.
///
/// Parameters are `[ax, ay, az, tx, ty, tz]`; angles in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Euler3DTransform {
    angles: [f64; 3],
    translation: [f64; 3],
    center: Point3,
}

impl Euler3DTransform {
    pub const NUMBER_OF_PARAMETERS: usize = 6;

    pub fn new(angles: [f64; 3], translation: [f64; 3], center: Point3) -> Self {
        Self {
            angles,
            translation,
            center,
        }
    }

    pub fn identity(center: Point3) -> Self {
        Self::new([0.0; 3], [0.0; 3], center)
    }

    pub fn angles(&self) -> [f64; 3] {
        self.angles
    }

    pub fn translation(&self) -> [f64; 3] {
        self.translation
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        let [ax, ay, az] = self.angles;
        euler_zyx_matrix(ax, ay, az)
    }

    /// Rotation matrix built from an angle tensor `[3]`, differentiable in the angles.
    fn rotation_tensor<B: Backend>(angles: Tensor<B, 1>) -> Tensor<B, 2> {
        let [alpha, beta, gamma] = components(angles);
        let cx = alpha.clone().cos();
        let sx = alpha.sin();
        let cy = beta.clone().cos();
        let sy = beta.sin();
        let cz = gamma.clone().cos();
        let sz = gamma.sin();

        assemble_matrix([
            cz.clone() * cy.clone(),
            cz.clone() * sy.clone() * sx.clone() - sz.clone() * cx.clone(),
            cz.clone() * sy.clone() * cx.clone() + sz.clone() * sx.clone(),
            sz.clone() * cy.clone(),
            sz.clone() * sy.clone() * sx.clone() + cz.clone() * cx.clone(),
            sz * sy.clone() * cx.clone() - cz * sx.clone(),
            sy.neg(),
            cy.clone() * sx,
            cy * cx,
        ])
    }
}

impl ParametricTransform for Euler3DTransform {
    fn number_of_parameters(&self) -> usize {
        Self::NUMBER_OF_PARAMETERS
    }

    fn parameters(&self) -> Vec<f64> {
        self.angles.iter().chain(self.translation.iter()).copied().collect()
    }

    fn with_parameters(&self, parameters: &[f64]) -> Result<Self> {
        if parameters.len() != Self::NUMBER_OF_PARAMETERS {
            return Err(CoreError::invalid_parameter(
                "parameters",
                format!("Euler3D expects 6 values, got {}", parameters.len()),
            ));
        }
        Ok(Self::new(
            [parameters[0], parameters[1], parameters[2]],
            [parameters[3], parameters[4], parameters[5]],
            self.center,
        ))
    }

    fn center(&self) -> Point3 {
        self.center
    }

    fn transform_point(&self, point: &Point3) -> Point3 {
        let rotated = Vector(self.rotation_matrix() * (*point - self.center).0);
        self.center + rotated + Vector::new(self.translation)
    }

    fn transform_points_with<B: Backend>(&self, parameters: Tensor<B, 1>, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = points.device();
        let rotation = Self::rotation_tensor(parameters.clone().slice([0..3]));
        let translation = parameters.slice([3..6]).reshape([1, 3]);
        apply_about_center(points, rotation, row_tensor(self.center.to_array(), &device), translation)
    }
}

impl<B: Backend> Transform<B, 3> for Euler3DTransform {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = points.device();
        apply_about_center(
            points,
            matrix_tensor(&self.rotation_matrix(), &device),
            row_tensor(self.center.to_array(), &device),
            row_tensor(self.translation, &device),
        )
    }
}
