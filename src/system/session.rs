//! AR session - per-frame orchestration.
//!
//! The `ArSession` is the top-level struct that applications drive. It owns
//! the trackable registry, origin groups, cameras and tracked objects, and
//! runs them in a fixed order once per frame:
//!
//! 1. apply engine events (auto-created / auto-removed trackables)
//! 2. update every trackable (lazy load, pose query)
//! 3. resolve each origin group's base
//! 4. move cameras and compute their viewports
//! 5. place tracked objects

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use nalgebra::Matrix4;
use tracing::{info, warn};

use crate::config::{DisplayConfig, SceneConfig};
use crate::engine::{TrackableEvent, TrackingEngine};
use crate::origin::{FindMode, OriginGroup};
use crate::scene::{
    CameraSettings, ObjectSettings, Reference, SceneNode, TrackedCamera, TrackedObject,
    TrackedObjectEvent,
};
use crate::tracking::{
    LifecycleState, RegistryChange, Trackable, TrackableRegistry, VisibilityChange,
};
use crate::viewport::{StereoEye, Viewport};

/// Origin group with its placement in the world.
pub struct Origin {
    pub group: OriginGroup,
    pub local_to_world: Matrix4<f64>,
}

/// Counts of trackables per lifecycle state, plus how many are visible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStatus {
    pub unconfigured: usize,
    pub pending: usize,
    pub loaded: usize,
    pub load_errors: usize,
    pub visible: usize,
}

/// What happened during one frame.
#[derive(Debug, Default)]
pub struct FrameReport {
    pub frame: u64,
    pub time: f64,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub visibility: Vec<(String, VisibilityChange)>,
    /// Base tag per origin group, in group order.
    pub bases: Vec<(String, Option<String>)>,
    pub viewports: Vec<(String, Viewport)>,
    pub object_events: Vec<(String, TrackedObjectEvent)>,
}

pub struct ArSession {
    engine: Arc<dyn TrackingEngine>,
    registry: TrackableRegistry,
    origins: Vec<Origin>,
    cameras: Vec<(TrackedCamera, SceneNode)>,
    objects: Vec<(TrackedObject, SceneNode)>,
    display: DisplayConfig,
    frame: u64,
}

impl ArSession {
    /// Create an empty session. `events` is the receiving end of the channel
    /// the engine posts trackable events to.
    pub fn new(engine: Arc<dyn TrackingEngine>, events: Receiver<TrackableEvent>) -> Self {
        Self {
            registry: TrackableRegistry::new(engine.clone(), events),
            engine,
            origins: Vec::new(),
            cameras: Vec::new(),
            objects: Vec::new(),
            display: DisplayConfig::default(),
            frame: 0,
        }
    }

    /// Build a session from a scene description.
    ///
    /// Trackables are created but not loaded; loading happens on the first
    /// frames once the engine is initialized.
    pub fn from_config(
        config: &SceneConfig,
        engine: Arc<dyn TrackingEngine>,
        events: Receiver<TrackableEvent>,
    ) -> Result<Self> {
        let mut session = Self::new(engine, events);
        session.display = config.display;

        for entry in &config.trackables {
            let tc = entry
                .to_config(&config.asset_root)
                .with_context(|| format!("Failed to configure trackable '{}'", entry.tag))?;
            let trackable = Trackable::with_config(&entry.tag, tc, session.engine.clone())?
                .with_asset_root(&config.asset_root);
            trackable.set_options(entry.options);
            if !entry.enabled {
                trackable.set_enabled(false);
            }
            session.registry.insert(trackable);
        }

        for entry in &config.origins {
            let mut group = OriginGroup::new(&entry.name, entry.find_mode());
            match group.find_mode() {
                FindMode::Manual => {
                    for tag in &entry.tags {
                        match session.registry.by_tag(tag) {
                            Some(t) => group.add_member(t, false),
                            None => warn!("origin '{}': no trackable '{}'", entry.name, tag),
                        }
                    }
                }
                _ => group.find_members(session.registry.iter()),
            }
            session.origins.push(Origin {
                group,
                local_to_world: entry.local_to_world()?,
            });
        }

        for camera in &config.cameras {
            session.add_camera(camera.clone());
        }
        for object in &config.objects {
            session.add_object(object.clone());
        }

        info!(
            "Session: {} trackables, {} origins, {} cameras, {} objects",
            session.registry.len(),
            session.origins.len(),
            session.cameras.len(),
            session.objects.len()
        );
        Ok(session)
    }

    /// Load a scene file and build a session from it.
    pub fn from_file(
        path: impl AsRef<Path>,
        engine: Arc<dyn TrackingEngine>,
        events: Receiver<TrackableEvent>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let config = SceneConfig::load(path)
            .with_context(|| format!("Failed to load scene {}", path.display()))?;
        Self::from_config(&config, engine, events)
    }

    /// Register a trackable and offer it to every origin group.
    pub fn add_trackable(&mut self, trackable: Trackable) -> Arc<Trackable> {
        let trackable = self.registry.insert(trackable);
        for origin in &mut self.origins {
            origin.group.offer(&trackable);
        }
        trackable
    }

    /// Unload and forget a trackable.
    pub fn remove_trackable(&mut self, tag: &str) -> bool {
        let Some(trackable) = self.registry.remove(tag) else {
            return false;
        };
        for origin in &mut self.origins {
            origin.group.remove_member(&trackable);
        }
        true
    }

    pub fn add_origin(&mut self, group: OriginGroup, local_to_world: Matrix4<f64>) {
        self.origins.push(Origin {
            group,
            local_to_world,
        });
    }

    pub fn add_camera(&mut self, settings: CameraSettings) {
        let node = SceneNode::new(&settings.name);
        self.cameras.push((TrackedCamera::new(settings), node));
    }

    pub fn add_object(&mut self, settings: ObjectSettings) {
        let node = SceneNode::new(&settings.name);
        self.objects.push((TrackedObject::new(settings), node));
    }

    pub fn engine(&self) -> &Arc<dyn TrackingEngine> {
        &self.engine
    }

    pub fn registry(&self) -> &TrackableRegistry {
        &self.registry
    }

    pub fn origins(&self) -> &[Origin] {
        &self.origins
    }

    pub fn origin(&self, name: &str) -> Option<&Origin> {
        self.origins.iter().find(|o| o.group.name() == name)
    }

    pub fn origin_mut(&mut self, name: &str) -> Option<&mut Origin> {
        self.origins.iter_mut().find(|o| o.group.name() == name)
    }

    pub fn cameras(&self) -> &[(TrackedCamera, SceneNode)] {
        &self.cameras
    }

    pub fn cameras_mut(&mut self) -> &mut [(TrackedCamera, SceneNode)] {
        &mut self.cameras
    }

    pub fn objects(&self) -> &[(TrackedObject, SceneNode)] {
        &self.objects
    }

    pub fn display(&self) -> &DisplayConfig {
        &self.display
    }

    /// Change video or screen geometry, e.g. after a resize.
    pub fn set_display(&mut self, display: DisplayConfig) {
        self.display = display;
    }

    /// Number of frames processed so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn status(&self) -> SessionStatus {
        let mut status = SessionStatus::default();
        for t in self.registry.iter() {
            let s = t.snapshot();
            match s.state {
                LifecycleState::Unconfigured => status.unconfigured += 1,
                LifecycleState::PendingEngineInit => status.pending += 1,
                LifecycleState::Loaded => status.loaded += 1,
                LifecycleState::LoadError => status.load_errors += 1,
            }
            if s.visible {
                status.visible += 1;
            }
        }
        status
    }

    /// Run one frame. `now` is the frame time in seconds.
    pub fn process_frame(&mut self, now: f64) -> FrameReport {
        let mut report = FrameReport {
            frame: self.frame,
            time: now,
            ..FrameReport::default()
        };

        for change in self.registry.drain_events() {
            match change {
                RegistryChange::Added(t) => {
                    for origin in &mut self.origins {
                        origin.group.offer(&t);
                    }
                    report.added.push(t.tag().to_string());
                }
                RegistryChange::Removed(t) => {
                    for origin in &mut self.origins {
                        origin.group.remove_member(&t);
                    }
                    report.removed.push(t.tag().to_string());
                }
            }
        }

        for (t, change) in self.registry.update_all() {
            info!("{} '{}' {:?}", t.id(), t.tag(), change);
            report.visibility.push((t.tag().to_string(), change));
        }

        for origin in &mut self.origins {
            let base = origin.group.resolve_base();
            report.bases.push((
                origin.group.name().to_string(),
                base.map(|b| b.tag().to_string()),
            ));
        }

        let display = self.display;
        for (camera, node) in &mut self.cameras {
            if let Some(name) = &camera.settings().origin {
                let base = self
                    .origins
                    .iter()
                    .find(|o| o.group.name() == name)
                    .and_then(|o| o.group.base());
                camera.update_tracking(base.as_ref(), now);
                camera.apply(node);
            }
            let viewport = camera.viewport(
                (display.video_width, display.video_height),
                (display.screen_width, display.screen_height),
                display.orientation,
            );
            report.viewports.push((camera.name().to_string(), viewport));
        }

        let camera_to_world = self
            .cameras
            .iter()
            .find(|(c, _)| c.settings().stereo_eye != StereoEye::Right)
            .map_or_else(Matrix4::identity, |(_, node)| node.pose.to_matrix());

        for (object, node) in &mut self.objects {
            let settings = object.settings();
            let trackable = self.registry.by_tag(&settings.trackable);
            let reference = match &settings.origin {
                Some(name) => match self.origins.iter().find(|o| o.group.name() == name) {
                    Some(o) => Reference::Origin {
                        local_to_world: o.local_to_world,
                        base: o.group.base(),
                    },
                    None => Reference::Origin {
                        local_to_world: Matrix4::identity(),
                        base: None,
                    },
                },
                None => Reference::Camera {
                    local_to_world: camera_to_world,
                },
            };
            let name = settings.name.clone();
            if let Some(event) = object.update(trackable.as_ref(), &reference, now, node) {
                if event != TrackedObjectEvent::Tracked {
                    info!("object '{}' {:?}", name, event);
                }
                report.object_events.push((name, event));
            }
        }

        self.frame += 1;
        report
    }

    /// Unload every trackable. Safe to call more than once, and after the
    /// engine has shut down.
    pub fn shutdown(&mut self) {
        self.registry.unload_all();
        for origin in &mut self.origins {
            origin.group.remove_all();
        }
    }
}

impl Drop for ArSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{SimulatedEngine, event_channel};
    use crate::tracking::TrackableConfig;
    use approx::assert_relative_eq;

    const SCENE: &str = r#"
display: { video_width: 1280, video_height: 720, screen_width: 1000, screen_height: 500 }
trackables:
  - { tag: a, type: square_barcode, barcode_id: 1, width: 0.08 }
  - { tag: b, type: square_barcode, barcode_id: 2, width: 0.08 }
  - { tag: off, type: square_barcode, barcode_id: 3, width: 0.08, enabled: false }
origins:
  - { name: world, find_mode: manual, tags: [a, b] }
cameras:
  - { name: main, origin: world }
objects:
  - { name: cube, trackable: b, origin: world, seconds_to_remain_visible: 0.0 }
"#;

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

    fn session(engine: &Arc<SimulatedEngine>) -> ArSession {
        let (tx, rx) = event_channel();
        engine.subscribe(tx);
        let config = SceneConfig::from_yaml(SCENE).unwrap();
        ArSession::from_config(&config, engine.clone(), rx).unwrap()
    }

    fn id_of(session: &ArSession, tag: &str) -> crate::engine::TrackableId {
        session.registry().by_tag(tag).unwrap().id()
    }

    #[test]
    fn test_loads_once_engine_is_ready() {
        let engine = Arc::new(SimulatedEngine::new());
        let mut session = session(&engine);

        session.process_frame(0.0);
        assert_eq!(session.status().pending, 2);
        assert_eq!(engine.call_counts().add_trackable, 0);

        engine.set_initialized(true);
        session.process_frame(0.1);
        let status = session.status();
        assert_eq!(status.loaded, 2);
        assert_eq!(status.unconfigured, 1);

        session.process_frame(0.2);
        assert_eq!(engine.call_counts().add_trackable, 2);
    }

    #[test]
    fn test_frame_places_camera_and_object() {
        let engine = Arc::new(SimulatedEngine::initialized());
        let mut session = session(&engine);
        session.process_frame(0.0);

        engine.set_pose(id_of(&session, "a"), Some(pose_at(0.0, -500.0)));
        engine.set_pose(id_of(&session, "b"), Some(pose_at(100.0, -500.0)));
        let report = session.process_frame(0.1);

        assert_eq!(report.bases, vec![("world".to_string(), Some("a".to_string()))]);
        assert_eq!(report.visibility.len(), 2);
        assert_eq!(report.object_events, vec![("cube".to_string(), TrackedObjectEvent::Found)]);

        let (camera, camera_node) = &session.cameras()[0];
        assert!(camera.is_visible());
        assert_relative_eq!(camera_node.pose.translation.z, -0.5, epsilon = 1e-9);

        let (_, cube) = &session.objects()[0];
        assert!(cube.visible);
        assert_relative_eq!(cube.pose.translation.x, 0.1, epsilon = 1e-9);

        let (_, viewport) = &report.viewports[0];
        assert_eq!((viewport.rect.width, viewport.rect.height), (888, 500));
    }

    #[test]
    fn test_auto_created_joins_auto_origin() {
        let engine = Arc::new(SimulatedEngine::initialized());
        let (tx, rx) = event_channel();
        engine.subscribe(tx);
        let mut session = ArSession::new(engine.clone(), rx);
        session.add_origin(OriginGroup::new("world", FindMode::AutoAll), Matrix4::identity());

        let id = engine.auto_create_barcode(20, 80.0);
        let report = session.process_frame(0.0);
        assert_eq!(report.added, vec!["barcode_20".to_string()]);
        assert_eq!(session.origin("world").unwrap().group.members().len(), 1);

        engine.set_pose(id, Some(pose_at(0.0, -300.0)));
        let report = session.process_frame(0.1);
        assert_eq!(report.bases[0].1.as_deref(), Some("barcode_20"));

        engine.auto_remove(id);
        let report = session.process_frame(0.2);
        assert_eq!(report.removed, vec!["barcode_20".to_string()]);
        assert!(session.origin("world").unwrap().group.members().is_empty());
        assert_eq!(report.bases[0].1, None);
    }

    #[test]
    fn test_add_and_remove_trackable() {
        let engine = Arc::new(SimulatedEngine::initialized());
        let (_tx, rx) = event_channel();
        let mut session = ArSession::new(engine.clone(), rx);
        session.add_origin(
            OriginGroup::new("world", FindMode::AutoByTags(vec!["pinball".into()])),
            Matrix4::identity(),
        );

        let config = TrackableConfig::Nft { dataset: "pinball".into() };
        session.add_trackable(Trackable::with_config("pinball", config, engine.clone()).unwrap());
        assert_eq!(session.origin("world").unwrap().group.members().len(), 1);

        session.process_frame(0.0);
        assert_eq!(engine.num_trackables(), 1);

        assert!(session.remove_trackable("pinball"));
        assert_eq!(engine.num_trackables(), 0);
        assert!(session.origin("world").unwrap().group.members().is_empty());
    }

    #[test]
    fn test_shutdown_unloads_everything() {
        let engine = Arc::new(SimulatedEngine::initialized());
        let mut session = session(&engine);
        session.process_frame(0.0);
        assert_eq!(engine.num_trackables(), 2);

        session.shutdown();
        assert_eq!(engine.num_trackables(), 0);
        assert_eq!(session.status().loaded, 0);

        drop(session);
        assert_eq!(engine.call_counts().remove_trackable, 2);
    }
}
