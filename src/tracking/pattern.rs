//! Cached geometry of a trackable's sub-patterns.

use nalgebra::Matrix4;
use tracing::warn;

use crate::engine::{RawPatternConfig, TrackableId, TrackingEngine};
use crate::geometry::{MM_TO_M, host_pose_from_native};

/// One sub-pattern of a trackable, in host convention.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    /// Pattern-to-trackable transform (left-handed, metres).
    pub matrix: Matrix4<f64>,
    /// Metres.
    pub width: f64,
    /// Metres.
    pub height: f64,
    pub image_size_x: i32,
    pub image_size_y: i32,
}

impl Pattern {
    pub fn from_raw(raw: &RawPatternConfig) -> Self {
        Self {
            matrix: host_pose_from_native(&raw.matrix),
            width: f64::from(raw.width) * MM_TO_M,
            height: f64::from(raw.height) * MM_TO_M,
            image_size_x: raw.image_size_x,
            image_size_y: raw.image_size_y,
        }
    }
}

/// Fetch every sub-pattern of a registered trackable.
///
/// Patterns the engine fails to describe are skipped with a warning.
pub fn fetch_patterns(engine: &dyn TrackingEngine, id: TrackableId) -> Vec<Pattern> {
    let count = engine.pattern_count(id).max(0);
    (0..count)
        .filter_map(|i| match engine.pattern_config(id, i) {
            Some(raw) => Some(Pattern::from_raw(&raw)),
            None => {
                warn!("{}: pattern {} of {} could not be read", id, i, count);
                None
            }
        })
        .collect()
}
