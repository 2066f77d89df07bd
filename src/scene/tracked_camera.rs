//! Camera driven by an origin group's base trackable.
//!
//! The camera sits at the inverse of the base pose, so the origin group stays
//! fixed in the scene and the camera moves around it. It also owns its
//! display settings and asks the viewport compositor where to draw.

use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use crate::geometry::{Pose, rigid_inverse};
use crate::tracking::Trackable;
use crate::viewport::{
    ContentAlign, ContentMode, ScreenOrientation, StereoEye, Viewport, ViewportRequest, compute_mono,
    perspective,
};

use super::SceneObject;

/// Display settings of one camera.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub name: String,
    /// Origin group whose base drives the camera pose.
    pub origin: Option<String>,
    pub content_mode: ContentMode,
    pub content_align: ContentAlign,
    pub rotate90: bool,
    pub flip_h: bool,
    pub flip_v: bool,
    pub stereo_eye: StereoEye,
    /// Clip planes, metres.
    pub near: f64,
    pub far: f64,
    /// Vertical field of view of the default projection, degrees.
    pub fov_y: f64,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            name: "camera".into(),
            origin: None,
            content_mode: ContentMode::Fit,
            content_align: ContentAlign::Center,
            rotate90: false,
            flip_h: false,
            flip_v: false,
            stereo_eye: StereoEye::None,
            near: 0.01,
            far: 100.0,
            fov_y: 60.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrackedCamera {
    settings: CameraSettings,
    visible: bool,
    pose: Pose,
    time_tracking_lost: f64,
}

impl TrackedCamera {
    pub fn new(settings: CameraSettings) -> Self {
        Self {
            settings,
            visible: false,
            pose: Pose::identity(),
            time_tracking_lost: 0.0,
        }
    }

    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    /// Whether the camera had a visible base on the last update.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Camera pose in the origin frame; held at its last value while lost.
    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    pub fn time_tracking_lost(&self) -> f64 {
        self.time_tracking_lost
    }

    /// Follow the base trackable. A right-eye stereo camera uses the
    /// right-eye pose.
    pub fn update_tracking(&mut self, base: Option<&Arc<Trackable>>, now: f64) {
        let snapshot = base.map(|b| b.snapshot()).filter(|s| s.visible);
        match snapshot {
            Some(s) => {
                let pose = if self.settings.stereo_eye == StereoEye::Right {
                    s.pose_right
                } else {
                    s.pose
                };
                self.pose = Pose::from_matrix(&rigid_inverse(&pose));
                self.visible = true;
            }
            None => {
                if self.visible {
                    self.time_tracking_lost = now;
                    self.visible = false;
                }
            }
        }
    }

    /// Push the pose to the host camera node while tracked.
    pub fn apply(&self, node: &mut dyn SceneObject) {
        if self.visible {
            node.set_local_transform(&self.pose);
        }
    }

    /// Build this frame's viewport request for the given video and screen.
    pub fn viewport_request(
        &self,
        source: (u32, u32),
        screen: (u32, u32),
        orientation: ScreenOrientation,
    ) -> ViewportRequest {
        let s = &self.settings;
        // Content axes swap when exactly one of rotate90 and portrait holds.
        let (w, h) = if s.rotate90 != orientation.is_portrait() {
            (source.1, source.0)
        } else {
            source
        };
        let aspect = if h == 0 { 0.0 } else { f64::from(w) / f64::from(h) };
        let mut request = ViewportRequest::new(source.0, source.1, screen.0, screen.1);
        request.content_mode = s.content_mode;
        request.content_align = s.content_align;
        request.rotate90 = s.rotate90;
        request.flip_h = s.flip_h;
        request.flip_v = s.flip_v;
        request.stereo = s.stereo_eye;
        request.orientation = orientation;
        request.base_projection = perspective(s.fov_y, aspect, s.near, s.far);
        request
    }

    pub fn viewport(
        &self,
        source: (u32, u32),
        screen: (u32, u32),
        orientation: ScreenOrientation,
    ) -> Viewport {
        compute_mono(&self.viewport_request(source, screen, orientation))
    }

    /// Advance to the next content mode and return it.
    pub fn cycle_content_mode(&mut self) -> ContentMode {
        self.settings.content_mode = self.settings.content_mode.next();
        info!("camera '{}': content mode {}", self.settings.name, self.settings.content_mode);
        self.settings.content_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SimulatedEngine;
    use crate::scene::SceneNode;
    use crate::tracking::TrackableConfig;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn pose_at(x_mm: f32, z_mm: f32) -> [f32; 16] {
        let mut m = [0.0f32; 16];
        m[0] = 1.0;
        m[5] = 1.0;
        m[10] = 1.0;
        m[15] = 1.0;
        m[12] = x_mm;
        m[14] = z_mm;
        m
    }

    fn base(engine: &Arc<SimulatedEngine>) -> Arc<Trackable> {
        let config = TrackableConfig::SquareBarcode { barcode_id: 0, width: 0.08 };
        let t = Arc::new(Trackable::with_config("base", config, engine.clone()).unwrap());
        t.load();
        t
    }

    #[test]
    fn test_camera_is_inverse_of_base() {
        let engine = Arc::new(SimulatedEngine::initialized());
        let b = base(&engine);
        engine.set_pose(b.id(), Some(pose_at(100.0, -500.0)));
        b.update();

        let mut camera = TrackedCamera::new(CameraSettings::default());
        let mut node = SceneNode::new("camera");
        camera.update_tracking(Some(&b), 0.0);
        camera.apply(&mut node);

        assert!(camera.is_visible());
        assert_relative_eq!(node.pose.translation, Vector3::new(-0.1, 0.0, -0.5), epsilon = 1e-9);
    }

    #[test]
    fn test_right_eye_uses_right_pose() {
        let engine = Arc::new(SimulatedEngine::initialized());
        engine.set_stereo(true);
        let b = base(&engine);
        engine.set_pose_stereo(b.id(), Some((pose_at(0.0, -500.0), pose_at(-60.0, -500.0))));
        b.update();

        let mut camera = TrackedCamera::new(CameraSettings {
            stereo_eye: StereoEye::Right,
            ..CameraSettings::default()
        });
        camera.update_tracking(Some(&b), 0.0);
        assert_relative_eq!(camera.pose().translation.x, 0.06, epsilon = 1e-9);
    }

    #[test]
    fn test_lost_keeps_last_pose() {
        let engine = Arc::new(SimulatedEngine::initialized());
        let b = base(&engine);
        engine.set_pose(b.id(), Some(pose_at(0.0, -500.0)));
        b.update();
        let mut camera = TrackedCamera::new(CameraSettings::default());
        camera.update_tracking(Some(&b), 1.0);

        camera.update_tracking(None, 2.0);
        assert!(!camera.is_visible());
        assert_eq!(camera.time_tracking_lost(), 2.0);
        assert_relative_eq!(camera.pose().translation.z, -0.5, epsilon = 1e-9);

        camera.update_tracking(None, 3.0);
        assert_eq!(camera.time_tracking_lost(), 2.0);
    }

    #[test]
    fn test_viewport_uses_settings() {
        let mut camera = TrackedCamera::new(CameraSettings {
            content_mode: ContentMode::Fill,
            ..CameraSettings::default()
        });
        let vp = camera.viewport((1280, 720), (1000, 500), ScreenOrientation::LandscapeLeft);
        assert_eq!((vp.rect.width, vp.rect.height), (1000, 562));

        assert_eq!(camera.cycle_content_mode(), ContentMode::Stretch);
        let vp = camera.viewport((1280, 720), (1000, 500), ScreenOrientation::LandscapeLeft);
        assert_eq!((vp.rect.width, vp.rect.height), (1000, 500));
    }

    #[test]
    fn test_projection_aspect_follows_content_axes() {
        let ratio = |rotate90: bool, orientation: ScreenOrientation| {
            let camera = TrackedCamera::new(CameraSettings {
                rotate90,
                ..CameraSettings::default()
            });
            let p = camera.viewport_request((1280, 720), (1000, 500), orientation).base_projection;
            p[(1, 1)] / p[(0, 0)]
        };

        assert_relative_eq!(ratio(false, ScreenOrientation::LandscapeLeft), 1280.0 / 720.0, epsilon = 1e-9);
        assert_relative_eq!(ratio(true, ScreenOrientation::LandscapeLeft), 720.0 / 1280.0, epsilon = 1e-9);
        assert_relative_eq!(ratio(false, ScreenOrientation::Portrait), 720.0 / 1280.0, epsilon = 1e-9);
        assert_relative_eq!(ratio(true, ScreenOrientation::Portrait), 1280.0 / 720.0, epsilon = 1e-9);
    }

    #[test]
    fn test_settings_from_yaml() {
        let yaml = "name: main\ncontent_mode: one_to_one\ncontent_align: bottom_right\nstereo_eye: left\n";
        let s: CameraSettings = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(s.content_mode, ContentMode::OneToOne);
        assert_eq!(s.content_align, ContentAlign::BottomRight);
        assert_eq!(s.stereo_eye, StereoEye::Left);
        assert_eq!(s.near, 0.01);
    }
}
