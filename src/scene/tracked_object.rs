//! Scene content attached to a trackable.

use std::sync::Arc;

use nalgebra::Matrix4;
use serde::Deserialize;

use crate::geometry::{Pose, rigid_inverse};
use crate::tracking::Trackable;

use super::SceneObject;

/// Declarative settings for a tracked object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ObjectSettings {
    pub name: String,
    /// Tag of the trackable the object follows.
    pub trackable: String,
    /// Origin group the object is placed in; `None` places it relative to
    /// the camera.
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub seconds_to_remain_visible: f64,
}

/// Frame an object is positioned in.
#[derive(Debug, Clone)]
pub enum Reference {
    /// Inside an origin group whose current base is `base`.
    Origin {
        local_to_world: Matrix4<f64>,
        base: Option<Arc<Trackable>>,
    },
    /// No origin: relative to the camera.
    Camera { local_to_world: Matrix4<f64> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackedObjectEvent {
    /// First tracked frame after being hidden.
    Found,
    /// Any later tracked frame.
    Tracked,
    /// Hidden, after the hold-over ran out.
    Lost,
}

#[derive(Debug, Clone)]
pub struct TrackedObject {
    settings: ObjectSettings,
    visible: bool,
    visible_or_remain: bool,
    time_tracking_lost: f64,
}

impl TrackedObject {
    pub fn new(settings: ObjectSettings) -> Self {
        Self {
            settings,
            visible: false,
            visible_or_remain: false,
            time_tracking_lost: 0.0,
        }
    }

    pub fn settings(&self) -> &ObjectSettings {
        &self.settings
    }

    /// Tracked this frame.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Tracked, or lost less than `seconds_to_remain_visible` ago.
    pub fn is_shown(&self) -> bool {
        self.visible_or_remain
    }

    /// Position `node` for this frame. `now` is in seconds.
    pub fn update(
        &mut self,
        trackable: Option<&Arc<Trackable>>,
        reference: &Reference,
        now: f64,
        node: &mut dyn SceneObject,
    ) -> Option<TrackedObjectEvent> {
        let Some(trackable) = trackable else {
            let was_shown = self.visible_or_remain;
            self.visible = false;
            self.visible_or_remain = false;
            if was_shown {
                node.set_visible(false);
                return Some(TrackedObjectEvent::Lost);
            }
            return None;
        };

        match compose_pose(trackable, reference) {
            Some(pose) => Some(self.on_visible(&pose, node)),
            None => self.on_not_visible(now, node),
        }
    }

    fn on_visible(&mut self, pose: &Matrix4<f64>, node: &mut dyn SceneObject) -> TrackedObjectEvent {
        node.set_local_transform(&Pose::from_matrix(pose));
        let was_shown = self.visible_or_remain;
        self.visible = true;
        self.visible_or_remain = true;
        if was_shown {
            TrackedObjectEvent::Tracked
        } else {
            node.set_visible(true);
            TrackedObjectEvent::Found
        }
    }

    fn on_not_visible(&mut self, now: f64, node: &mut dyn SceneObject) -> Option<TrackedObjectEvent> {
        if self.visible {
            self.visible = false;
            self.time_tracking_lost = now;
        }
        if self.visible_or_remain
            && now - self.time_tracking_lost >= self.settings.seconds_to_remain_visible
        {
            self.visible_or_remain = false;
            node.set_visible(false);
            return Some(TrackedObjectEvent::Lost);
        }
        None
    }
}

/// World pose of `trackable`, or `None` if it cannot be placed this frame.
///
/// In an origin group: `origin * inverse(base) * trackable`, or just the
/// origin transform for the base itself.
pub fn compose_pose(trackable: &Arc<Trackable>, reference: &Reference) -> Option<Matrix4<f64>> {
    let snapshot = trackable.snapshot();
    if !snapshot.visible {
        return None;
    }
    match reference {
        Reference::Origin { local_to_world, base } => {
            let base = base.as_ref()?;
            if Arc::ptr_eq(base, trackable) {
                Some(*local_to_world)
            } else {
                Some(local_to_world * rigid_inverse(&base.pose()) * snapshot.pose)
            }
        }
        Reference::Camera { local_to_world } => Some(local_to_world * snapshot.pose),
    }
}
