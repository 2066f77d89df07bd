//! Coordinate frame conventions shared by the tracking engine and the host scene.
//!
//! All pose conversions between the native tracker and the host live here, so
//! that no other module needs to know which axis points where or which unit a
//! matrix is expressed in.
//!
//! # Frame Conventions
//!
//! ## Native Tracker Frame (right-handed, millimetres)
//! ```text
//!        +Y (up)
//!         |
//!         |
//!         +------ +X (right)
//!        /
//!       /
//!      +Z (toward viewer, out of the marker plane)
//! ```
//! - X: Right
//! - Y: Up
//! - Z: Toward the viewer
//! - Translations in **millimetres**
//!
//! ## Host Scene Frame (left-handed, metres)
//! ```text
//!        +Y (up)
//!         |   +Z (away from viewer, into the marker plane)
//!         |  /
//!         | /
//!         +------ +X (right)
//! ```
//! - X: Right
//! - Y: Up
//! - Z: Away from the viewer
//! - Translations in **metres**
//!
//! # Conversion Pipeline
//!
//! ```text
//! Native pose (float[16], column-major, RH, mm)
//!     │
//!     ▼ matrix_from_column_major()
//!     ▼ scale_translation(MM_TO_M)
//!     ▼ lh_from_rh()
//!     │
//! Host pose (Matrix4<f64>, LH, m)
//! ```
//!
//! The handedness flip is the similarity `S M S` with `S = diag(1, 1, -1, 1)`:
//! negate row 2, then negate column 2. Element (2, 2) is negated twice and
//! keeps its sign, which is why [`lh_from_rh`] is written as an explicit
//! per-element remap.

use nalgebra::Matrix4;

/// Native tracker length unit (mm) to host unit (m).
pub const MM_TO_M: f64 = 0.001;

/// Host length unit (m) to native tracker unit (mm).
pub const M_TO_MM: f64 = 1000.0;

/// Build a matrix from 16 column-major floats as delivered by the engine.
pub fn matrix_from_column_major(values: &[f32; 16]) -> Matrix4<f64> {
    let mut m = Matrix4::zeros();
    for (i, v) in values.iter().enumerate() {
        // Column-major: index i = col * 4 + row.
        m[(i % 4, i / 4)] = f64::from(*v);
    }
    m
}

/// Flatten a matrix to 16 column-major floats, the engine's layout.
pub fn matrix_to_column_major(m: &Matrix4<f64>) -> [f32; 16] {
    let mut out = [0.0f32; 16];
    for (i, v) in out.iter_mut().enumerate() {
        *v = m[(i % 4, i / 4)] as f32;
    }
    out
}

/// Scale only the translation column (rows 0..3 of column 3).
///
/// Rotation and the homogeneous row are left untouched, so this converts a
/// rigid transform between length units without disturbing its orientation.
pub fn scale_translation(m: &Matrix4<f64>, factor: f64) -> Matrix4<f64> {
    let mut out = *m;
    out[(0, 3)] *= factor;
    out[(1, 3)] *= factor;
    out[(2, 3)] *= factor;
    out
}

/// Convert a right-handed (Z toward viewer) matrix to left-handed (Z away).
#[rustfmt::skip]
pub fn lh_from_rh(rhm: &Matrix4<f64>) -> Matrix4<f64> {
    let mut lhm = Matrix4::zeros();

    // Column 0.
    lhm[(0, 0)] =  rhm[(0, 0)];
    lhm[(1, 0)] =  rhm[(1, 0)];
    lhm[(2, 0)] = -rhm[(2, 0)];
    lhm[(3, 0)] =  rhm[(3, 0)];

    // Column 1.
    lhm[(0, 1)] =  rhm[(0, 1)];
    lhm[(1, 1)] =  rhm[(1, 1)];
    lhm[(2, 1)] = -rhm[(2, 1)];
    lhm[(3, 1)] =  rhm[(3, 1)];

    // Column 2 (Z basis): its own Z component keeps sign.
    lhm[(0, 2)] = -rhm[(0, 2)];
    lhm[(1, 2)] = -rhm[(1, 2)];
    lhm[(2, 2)] =  rhm[(2, 2)];
    lhm[(3, 2)] = -rhm[(3, 2)];

    // Column 3 (translation).
    lhm[(0, 3)] =  rhm[(0, 3)];
    lhm[(1, 3)] =  rhm[(1, 3)];
    lhm[(2, 3)] = -rhm[(2, 3)];
    lhm[(3, 3)] =  rhm[(3, 3)];

    lhm
}

/// Convert a left-handed matrix back to right-handed.
///
/// The remap is an involution, so this is [`lh_from_rh`] applied again.
pub fn rh_from_lh(lhm: &Matrix4<f64>) -> Matrix4<f64> {
    lh_from_rh(lhm)
}

/// Full native → host conversion for a pose reported by the engine.
pub fn host_pose_from_native(raw: &[f32; 16]) -> Matrix4<f64> {
    let native = matrix_from_column_major(raw);
    lh_from_rh(&scale_translation(&native, MM_TO_M))
}

/// Full host → native conversion, the inverse of [`host_pose_from_native`].
pub fn native_pose_from_host(m: &Matrix4<f64>) -> [f32; 16] {
    matrix_to_column_major(&scale_translation(&rh_from_lh(m), M_TO_MM))
}
