//! Rigid pose: rotation + translation, decomposed from a homogeneous matrix.
//!
//! Host scene objects are driven by position/rotation pairs rather than raw
//! matrices, so every matrix handed to the scene goes through [`Pose::from_matrix`].

use nalgebra::{Matrix3, Matrix4, UnitQuaternion, Vector3};

/// Columns shorter than this are treated as degenerate.
const DEGENERATE_AXIS_NORM: f64 = 1e-9;

/// 6-DOF rigid transformation.
///
/// Transforms points as: p' = R * p + t
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

impl Pose {
    /// Identity transformation.
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Decompose a homogeneous matrix into position and rotation.
    ///
    /// The rotation is the closest proper rotation to the upper-left 3x3 block
    /// after normalising its columns, so poses carrying a uniform scale still
    /// decompose cleanly. A matrix whose Z column is zero has no usable
    /// orientation and yields the identity rotation.
    pub fn from_matrix(m: &Matrix4<f64>) -> Self {
        let translation = position_from_matrix(m);

        let block = m.fixed_view::<3, 3>(0, 0).into_owned();
        if block.column(2).norm() < DEGENERATE_AXIS_NORM {
            return Self {
                rotation: UnitQuaternion::identity(),
                translation,
            };
        }

        let mut normalized = Matrix3::zeros();
        for c in 0..3 {
            let col = block.column(c);
            let norm = col.norm();
            if norm > DEGENERATE_AXIS_NORM {
                normalized.set_column(c, &(col / norm));
            }
        }

        Self {
            rotation: UnitQuaternion::from_matrix(&normalized),
            translation,
        }
    }

    /// Homogeneous 4x4 matrix of form [R | t; 0 0 0 1].
    pub fn to_matrix(&self) -> Matrix4<f64> {
        let mut m = self.rotation.to_homogeneous();
        m[(0, 3)] = self.translation.x;
        m[(1, 3)] = self.translation.y;
        m[(2, 3)] = self.translation.z;
        m
    }

    /// Inverse transformation: [R^T | -R^T t].
    pub fn inverse(&self) -> Self {
        let rot_inv = self.rotation.inverse();
        Self {
            rotation: rot_inv,
            translation: -(rot_inv * self.translation),
        }
    }

    /// Compose two transforms: self ∘ other.
    pub fn compose(&self, other: &Pose) -> Self {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    /// Transform a single point.
    pub fn transform_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.translation
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

/// Translation column of a homogeneous matrix.
pub fn position_from_matrix(m: &Matrix4<f64>) -> Vector3<f64> {
    Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)])
}

/// Inverse of a rigid homogeneous transform.
///
/// Uses the closed form [R^T | -R^T t] rather than a general inverse, and
/// falls back to a general inverse only when the upper block is not
/// orthonormal (e.g. a scaled transform). Returns identity for singular input.
pub fn rigid_inverse(m: &Matrix4<f64>) -> Matrix4<f64> {
    let r = m.fixed_view::<3, 3>(0, 0).into_owned();
    let orthonormal = (r.transpose() * r - Matrix3::identity()).norm() < 1e-6;
    if !orthonormal {
        return m.try_inverse().unwrap_or_else(Matrix4::identity);
    }

    let rt = r.transpose();
    let t = -(rt * position_from_matrix(m));

    let mut inv = Matrix4::identity();
    inv.fixed_view_mut::<3, 3>(0, 0).copy_from(&rt);
    inv[(0, 3)] = t.x;
    inv[(1, 3)] = t.y;
    inv[(2, 3)] = t.z;
    inv
}
