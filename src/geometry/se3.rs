//! SE3: 6-DOF rigid transformation (rotation + translation).
//!
//! Naming follows `T_target_source`: `T_world_odom.transform_point(p_odom)`
//! yields the point in world coordinates.

use nalgebra::{Matrix3, UnitQuaternion, Vector3, Vector4};

/// Rigid body transformation.
///
/// Transforms points as: p' = R * p + t
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SE3 {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

impl SE3 {
    /// Identity transformation.
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Pure translation.
    pub fn from_translation(translation: Vector3<f64>) -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation,
        }
    }

    /// Inverse transformation.
    ///
    /// T = [R | t; 0 | 1]  =>  T^{-1} = [R^T | -R^T*t; 0 | 1]
    pub fn inverse(&self) -> Self {
        let rot_inv = self.rotation.inverse();
        Self {
            rotation: rot_inv,
            translation: -(rot_inv * self.translation),
        }
    }

    /// Compose two transforms: self ∘ other.
    ///
    /// [R1 | t1] ∘ [R2 | t2] = [R1*R2 | R1*t2 + t1]
    pub fn compose(&self, other: &SE3) -> Self {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    /// Transform a single point: p' = R * p + t.
    #[inline]
    pub fn transform_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.translation
    }

    /// Transform a homogeneous point, preserving its w component.
    ///
    /// Points with w = 1 are moved like `transform_point`; directions (w = 0)
    /// are only rotated.
    #[inline]
    pub fn transform_homogeneous(&self, p: &Vector4<f64>) -> Vector4<f64> {
        let rotated = self.rotation * p.xyz();
        let moved = rotated + self.translation * p.w;
        Vector4::new(moved.x, moved.y, moved.z, p.w)
    }

    /// Get the rotation matrix.
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.rotation.to_rotation_matrix().into_inner()
    }
}

impl Default for SE3 {
    fn default() -> Self {
        Self::identity()
    }
}
