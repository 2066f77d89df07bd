//! Scene binding: per-frame glue from tracking output to scene objects.
//!
//! The host scene graph is abstracted as [`SceneObject`]: something with a
//! settable local transform and a visibility flag. [`SceneNode`] is the plain
//! in-memory implementation used by the session and the replay tool.

pub mod tracked_camera;
pub mod tracked_object;

use crate::geometry::Pose;

pub use tracked_camera::{CameraSettings, TrackedCamera};
pub use tracked_object::{ObjectSettings, Reference, TrackedObject, TrackedObjectEvent};

/// A node in the host scene graph.
pub trait SceneObject {
    fn set_local_transform(&mut self, pose: &Pose);

    fn set_visible(&mut self, visible: bool);
}

/// In-memory scene node.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub pose: Pose,
    pub visible: bool,
}

impl SceneNode {
    /// Nodes start hidden until their trackable is found.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pose: Pose::identity(),
            visible: false,
        }
    }
}

impl SceneObject for SceneNode {
    fn set_local_transform(&mut self, pose: &Pose) {
        self.pose = *pose;
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }
}
