//! The set of trackables a session owns.
//!
//! Besides lookup by tag and engine id, the registry is where engine events
//! arrive: trackables the engine created or dropped on its own are announced
//! on a `crossbeam-channel` from the engine's callback thread and applied
//! here, on the frame thread, by [`TrackableRegistry::drain_events`].

use std::sync::Arc;

use crossbeam_channel::Receiver;
use tracing::{debug, info};

use crate::engine::{TrackableEvent, TrackableId, TrackingEngine};

use super::state::VisibilityChange;
use super::trackable::Trackable;

/// Membership change caused by an engine event.
#[derive(Debug, Clone)]
pub enum RegistryChange {
    Added(Arc<Trackable>),
    Removed(Arc<Trackable>),
}

pub struct TrackableRegistry {
    engine: Arc<dyn TrackingEngine>,
    events: Receiver<TrackableEvent>,
    trackables: Vec<Arc<Trackable>>,
}

impl TrackableRegistry {
    pub fn new(engine: Arc<dyn TrackingEngine>, events: Receiver<TrackableEvent>) -> Self {
        Self {
            engine,
            events,
            trackables: Vec::new(),
        }
    }

    /// Add a trackable. Insertion order is kept.
    pub fn insert(&mut self, trackable: Trackable) -> Arc<Trackable> {
        let trackable = Arc::new(trackable);
        self.trackables.push(trackable.clone());
        trackable
    }

    /// Unload and drop the trackable with `tag`.
    pub fn remove(&mut self, tag: &str) -> Option<Arc<Trackable>> {
        let index = self.trackables.iter().position(|t| t.tag() == tag)?;
        let trackable = self.trackables.remove(index);
        trackable.unload();
        Some(trackable)
    }

    pub fn by_tag(&self, tag: &str) -> Option<Arc<Trackable>> {
        self.trackables.iter().find(|t| t.tag() == tag).cloned()
    }

    pub fn by_id(&self, id: TrackableId) -> Option<Arc<Trackable>> {
        if !id.is_valid() {
            return None;
        }
        self.trackables.iter().find(|t| t.id() == id).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Trackable>> {
        self.trackables.iter()
    }

    pub fn len(&self) -> usize {
        self.trackables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackables.is_empty()
    }

    /// Apply all pending engine events.
    pub fn drain_events(&mut self) -> Vec<RegistryChange> {
        let mut changes = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            match event {
                TrackableEvent::AutoCreated(id) => {
                    if !self.engine.is_initialized() {
                        debug!("ignoring auto-created {} after engine shutdown", id);
                        continue;
                    }
                    if self.by_id(id).is_some() {
                        continue;
                    }
                    let adopted = Trackable::adopt(id, self.engine.clone());
                    let trackable = self.insert(adopted);
                    info!("auto-created {} '{}' ({})", id, trackable.tag(), trackable.kind());
                    changes.push(RegistryChange::Added(trackable));
                }
                TrackableEvent::AutoRemoved(id) => {
                    let Some(index) = self.trackables.iter().position(|t| t.id() == id) else {
                        debug!("auto-removed {} was not registered", id);
                        continue;
                    };
                    let trackable = self.trackables.remove(index);
                    trackable.detach();
                    info!("auto-removed {} '{}'", id, trackable.tag());
                    changes.push(RegistryChange::Removed(trackable));
                }
            }
        }
        changes
    }

    /// Run the per-frame update of every trackable, in insertion order.
    pub fn update_all(&self) -> Vec<(Arc<Trackable>, VisibilityChange)> {
        self.trackables
            .iter()
            .filter_map(|t| t.update().map(|change| (t.clone(), change)))
            .collect()
    }

    pub fn unload_all(&self) {
        for t in &self.trackables {
            t.unload();
        }
    }
}
