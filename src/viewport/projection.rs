//! Projection adjustment for rotated, flipped or re-oriented content.

use nalgebra::{Matrix4, Rotation3, Vector3};

use super::ScreenOrientation;

/// Rotation about the viewing axis by `degrees`, clockwise on screen.
fn roll(degrees: f64) -> Matrix4<f64> {
    // Positive angles about -Z, as the host scene expresses screen rotation.
    Rotation3::from_axis_angle(&Vector3::z_axis(), -degrees.to_radians()).to_homogeneous()
}

fn scale(x: f64, y: f64) -> Matrix4<f64> {
    Matrix4::new_nonuniform_scaling(&Vector3::new(x, y, 1.0))
}

/// Left-multiply the base projection by the content transforms.
///
/// Applied in order: 90° rotation, vertical flip, horizontal flip, then the
/// device orientation. Flips act on the rotated axes.
pub fn adjust_projection(
    base: &Matrix4<f64>,
    rotate90: bool,
    flip_h: bool,
    flip_v: bool,
    orientation: ScreenOrientation,
) -> Matrix4<f64> {
    let mut projection = *base;
    if rotate90 {
        projection = roll(90.0) * projection;
    }
    if flip_v {
        projection = scale(1.0, -1.0) * projection;
    }
    if flip_h {
        projection = scale(-1.0, 1.0) * projection;
    }
    orientation_rotation(orientation) * projection
}

/// Extra projection rotation for a device held in `orientation`.
pub fn orientation_rotation(orientation: ScreenOrientation) -> Matrix4<f64> {
    match orientation {
        ScreenOrientation::LandscapeLeft => Matrix4::identity(),
        ScreenOrientation::Portrait => roll(90.0),
        ScreenOrientation::PortraitUpsideDown => roll(-90.0),
        ScreenOrientation::LandscapeRight => roll(180.0),
    }
}

/// OpenGL-style perspective projection from a vertical field of view.
///
/// Used when no calibrated projection is available for the video source.
pub fn perspective(fov_y_degrees: f64, aspect: f64, near: f64, far: f64) -> Matrix4<f64> {
    let fov_ok = fov_y_degrees > 0.0 && fov_y_degrees < 180.0;
    if !fov_ok || aspect <= 0.0 || near <= 0.0 || far <= near {
        return Matrix4::identity();
    }
    let f = 1.0 / (fov_y_degrees.to_radians() / 2.0).tan();
    #[rustfmt::skip]
    let m = Matrix4::new(
        f / aspect, 0.0, 0.0,                          0.0,
        0.0,        f,   0.0,                          0.0,
        0.0,        0.0, (far + near) / (near - far),  2.0 * far * near / (near - far),
        0.0,        0.0, -1.0,                         0.0,
    );
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector4;

    fn apply(m: &Matrix4<f64>, x: f64, y: f64) -> (f64, f64) {
        let v = m * Vector4::new(x, y, 0.0, 1.0);
        (v.x, v.y)
    }

    #[test]
    fn test_no_flags_is_identity_on_base() {
        let base = perspective(60.0, 16.0 / 9.0, 0.01, 100.0);
        let out = adjust_projection(&base, false, false, false, ScreenOrientation::LandscapeLeft);
        assert_eq!(out, base);
    }

    #[test]
    fn test_rotate90_is_clockwise() {
        let m = adjust_projection(&Matrix4::identity(), true, false, false, ScreenOrientation::LandscapeLeft);
        let (x, y) = apply(&m, 1.0, 0.0);
        assert_relative_eq!(x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(y, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_flips_apply_after_rotation() {
        // Rotate then flip H: +X maps to (0, -1), H flip leaves Y, so (0, -1).
        // Flip H then rotate would give (0, 1).
        let m = adjust_projection(&Matrix4::identity(), true, true, false, ScreenOrientation::LandscapeLeft);
        let (x, y) = apply(&m, 1.0, 0.0);
        assert_relative_eq!(x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(y, -1.0, epsilon = 1e-12);

        let (x, y) = apply(&m, 0.0, 1.0);
        assert_relative_eq!(x, -1.0, epsilon = 1e-12);
        assert_relative_eq!(y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_flip_v_and_h() {
        let m = adjust_projection(&Matrix4::identity(), false, true, true, ScreenOrientation::LandscapeLeft);
        let (x, y) = apply(&m, 0.5, 0.25);
        assert_relative_eq!(x, -0.5, epsilon = 1e-12);
        assert_relative_eq!(y, -0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_orientation_rotations() {
        let upside_down = orientation_rotation(ScreenOrientation::LandscapeRight);
        let (x, y) = apply(&upside_down, 1.0, 0.0);
        assert_relative_eq!(x, -1.0, epsilon = 1e-12);
        assert_relative_eq!(y, 0.0, epsilon = 1e-12);

        let both = orientation_rotation(ScreenOrientation::Portrait)
            * orientation_rotation(ScreenOrientation::PortraitUpsideDown);
        assert_relative_eq!(both, Matrix4::identity(), epsilon = 1e-12);
    }

    #[test]
    fn test_perspective_rejects_bad_input() {
        assert_eq!(perspective(60.0, 0.0, 0.1, 10.0), Matrix4::identity());
        assert_eq!(perspective(60.0, 1.0, 1.0, 0.5), Matrix4::identity());
        assert_eq!(perspective(0.0, 1.0, 0.1, 10.0), Matrix4::identity());
        assert_eq!(perspective(180.0, 1.0, 0.1, 10.0), Matrix4::identity());
        assert_eq!(perspective(f64::NAN, 1.0, 0.1, 10.0), Matrix4::identity());
        assert!(perspective(179.0, 1.0, 0.1, 10.0).iter().all(|v| v.is_finite()));
    }
}
