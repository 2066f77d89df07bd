//! Rerun-based visualization of an AR session.
//!
//! Entity hierarchy:
//!     status               - Status bar with lifecycle counts and per-origin base
//!     world/
//!         trackables/{tag} - Trackable poses (hidden while not visible)
//!         cameras/{name}   - Tracked camera poses
//!         objects/{name}   - Tracked object poses
//!     screen/
//!         bounds           - Screen rectangle
//!         {camera}         - Viewport rectangle per camera
//!     plots/
//!         visible          - Number of visible trackables
//!         fps              - Replay rate

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use rerun::{RecordingStream, external::glam};

use crate::config::DisplayConfig;
use crate::geometry::Pose;
use crate::scene::SceneNode;
use crate::system::{FrameReport, SessionStatus};
use crate::tracking::TrackableRegistry;
use crate::viewport::Viewport;

pub struct RerunVisualizer {
    rec: RecordingStream,
    last_fps: f64,
    frame_times: Vec<f64>,
}

impl RerunVisualizer {
    /// Spawn a viewer process, or record to `save_to` when given.
    pub fn new(app_name: &str, save_to: Option<&Path>) -> Result<Self> {
        let builder = rerun::RecordingStreamBuilder::new(app_name);
        let rec = match save_to {
            Some(path) => builder
                .save(path)
                .with_context(|| format!("Failed to create recording {}", path.display()))?,
            None => builder.spawn().context("Failed to spawn rerun viewer")?,
        };

        // Host frame: X right, Y up, Z away from the viewer.
        rec.log_static("world", &rerun::ViewCoordinates::RUF()).ok();

        Ok(Self {
            rec,
            last_fps: 0.0,
            frame_times: Vec::new(),
        })
    }

    /// Set the frame index and time for all subsequent logs.
    pub fn set_time(&mut self, frame: u64, seconds: f64) {
        self.rec.set_time_sequence("frame", frame as i64);
        self.rec.set_duration_secs("time", seconds);
    }

    pub fn log_status_bar(&self, status: &SessionStatus, report: &FrameReport) {
        let bases: Vec<String> = report
            .bases
            .iter()
            .map(|(origin, base)| format!("{}: {}", origin, base.as_deref().unwrap_or("-")))
            .collect();

        let status_text = format!(
            "Frame {} | Loaded: {} | Pending: {} | Errors: {} | Visible: {} | Base [{}] | FPS: {:.1}",
            report.frame,
            status.loaded,
            status.pending,
            status.load_errors,
            status.visible,
            bases.join(", "),
            self.last_fps
        );

        self.rec
            .log(
                "status",
                &rerun::TextDocument::new(status_text)
                    .with_media_type(rerun::MediaType::markdown()),
            )
            .ok();
    }

    /// Log every visible trackable's pose; clear the ones that are not.
    pub fn log_trackables(&self, registry: &TrackableRegistry) {
        for t in registry.iter() {
            let path = format!("world/trackables/{}", t.tag());
            let snapshot = t.snapshot();
            if snapshot.visible {
                self.log_pose(&path, &Pose::from_matrix(&snapshot.pose));
            } else {
                self.rec.log(path.as_str(), &rerun::Clear::flat()).ok();
            }
        }
    }

    pub fn log_cameras<'a>(&self, cameras: impl IntoIterator<Item = &'a SceneNode>) {
        for node in cameras {
            self.log_pose(&format!("world/cameras/{}", node.name), &node.pose);
        }
    }

    pub fn log_objects<'a>(&self, objects: impl IntoIterator<Item = &'a SceneNode>) {
        for node in objects {
            let path = format!("world/objects/{}", node.name);
            if node.visible {
                self.log_pose(&path, &node.pose);
                self.rec
                    .log(
                        format!("{}/box", path).as_str(),
                        &rerun::Boxes3D::from_half_sizes([[0.02f32, 0.02, 0.02]])
                            .with_colors([[0u8, 100, 255]]),
                    )
                    .ok();
            } else {
                self.rec.log(path.as_str(), &rerun::Clear::recursive()).ok();
            }
        }
    }

    /// Log the screen bounds and each camera's viewport rectangle.
    pub fn log_viewports(&self, display: &DisplayConfig, viewports: &[(String, Viewport)]) {
        self.rec
            .log(
                "screen/bounds",
                &rerun::Boxes2D::from_mins_and_sizes(
                    [[0.0f32, 0.0]],
                    [[display.screen_width as f32, display.screen_height as f32]],
                )
                .with_colors([[128u8, 128, 128]]),
            )
            .ok();

        for (camera, viewport) in viewports {
            let r = viewport.rect;
            self.rec
                .log(
                    format!("screen/{}", camera).as_str(),
                    &rerun::Boxes2D::from_mins_and_sizes(
                        [[r.x as f32, r.y as f32]],
                        [[r.width as f32, r.height as f32]],
                    )
                    .with_colors([[0u8, 255, 0]])
                    .with_labels([format!("{} {}", camera, r)]),
                )
                .ok();
        }
    }

    pub fn log_plots(&mut self, status: &SessionStatus) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        self.frame_times.push(now);
        if self.frame_times.len() > 100 {
            self.frame_times.remove(0);
        }
        self.last_fps = match (self.frame_times.first(), self.frame_times.last()) {
            (Some(first), Some(last)) if last > first => {
                (self.frame_times.len() - 1) as f64 / (last - first)
            }
            _ => 0.0,
        };

        self.rec
            .log("plots/visible", &rerun::Scalars::new([status.visible as f64]))
            .ok();
        self.rec
            .log("plots/fps", &rerun::Scalars::new([self.last_fps]))
            .ok();
    }

    pub fn fps(&self) -> f64 {
        self.last_fps
    }

    fn log_pose(&self, path: &str, pose: &Pose) {
        let (translation, rotation) = to_glam(pose);
        self.rec
            .log(
                path,
                &rerun::Transform3D::from_translation_rotation(translation, rotation),
            )
            .ok();
    }
}

fn to_glam(pose: &Pose) -> (glam::Vec3, glam::Quat) {
    let t = &pose.translation;
    let q = &pose.rotation;
    (
        glam::Vec3::new(t.x as f32, t.y as f32, t.z as f32),
        glam::Quat::from_xyzw(
            q.coords.x as f32,
            q.coords.y as f32,
            q.coords.z as f32,
            q.w as f32,
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{UnitQuaternion, Vector3};

    #[test]
    fn test_to_glam_keeps_quaternion_order() {
        let pose = Pose {
            rotation: UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.5),
            translation: Vector3::new(1.0, 2.0, 3.0),
        };
        let (t, q) = to_glam(&pose);

        assert_eq!(t, glam::Vec3::new(1.0, 2.0, 3.0));
        assert!((q.w - pose.rotation.w as f32).abs() < 1e-6);
        assert!((q.y - pose.rotation.coords.y as f32).abs() < 1e-6);
        assert!(q.x.abs() < 1e-6);
    }
}
