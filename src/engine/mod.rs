//! Boundary to the native tracking engine.
//!
//! The engine itself (marker detection, barcode decoding, NFT matching, video
//! capture) lives outside this crate. Everything here talks to it through the
//! [`TrackingEngine`] trait, which is injected as an `Arc<dyn TrackingEngine>`
//! into every component that needs it. There is no global engine instance.
//!
//! The engine may own a background thread that announces trackables it
//! created or removed on its own (auto-created barcode markers). Those
//! notifications are forwarded as [`TrackableEvent`]s over a
//! `crossbeam-channel` and drained on the frame thread.

pub mod sim;

use crossbeam_channel::{Receiver, Sender, unbounded};

pub use sim::SimulatedEngine;

/// Engine-assigned handle of a native trackable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackableId(pub i32);

impl TrackableId {
    /// Sentinel meaning "not registered with the engine".
    pub const NO_ID: Self = Self(-1);

    /// Create a new TrackableId with the given value.
    pub fn new(id: i32) -> Self {
        Self(id)
    }

    /// True for any handle other than [`TrackableId::NO_ID`].
    pub fn is_valid(self) -> bool {
        self != Self::NO_ID
    }
}

impl Default for TrackableId {
    fn default() -> Self {
        Self::NO_ID
    }
}

impl std::fmt::Display for TrackableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UID{}", self.0)
    }
}

/// Shorthand for [`TrackableId::NO_ID`].
pub const NO_ID: TrackableId = TrackableId::NO_ID;

/// Per-trackable option keys understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum TrackableOption {
    /// Read-only int, trackable type as a [`crate::tracking::TrackableKind`] code.
    Type = 0,
    Filtered = 1,
    FilterSampleRate = 2,
    FilterCutoffFreq = 3,
    /// Square and barcode markers only.
    SquareUseContPoseEstimation = 4,
    SquareConfidence = 5,
    SquareConfidenceCutoff = 6,
    /// NFT only.
    NftScale = 7,
    MultiMinSubmarkers = 8,
    MultiMinConfMatrix = 9,
    MultiMinConfPattern = 10,
    MultiMinInlierProb = 11,
    /// Float, square marker width in millimetres.
    SquareWidth = 12,
    TwoDScale = 13,
    /// Read-only string, barcode id of a matrix-code marker.
    SquareBarcodeId = 14,
}

/// Notifications the engine raises for trackables it manages itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackableEvent {
    /// A detected-but-unconfigured matrix code became a native trackable.
    AutoCreated(TrackableId),
    /// A native trackable was dropped by the engine. It no longer exists.
    AutoRemoved(TrackableId),
}

impl TrackableEvent {
    /// Decode the engine's `(event_type, uid)` callback pair.
    ///
    /// Event type 1 is auto-created, 2 is auto-removed; anything else
    /// (including 0, "none") is ignored.
    pub fn from_raw(event_type: i32, uid: i32) -> Option<Self> {
        match event_type {
            1 => Some(Self::AutoCreated(TrackableId(uid))),
            2 => Some(Self::AutoRemoved(TrackableId(uid))),
            _ => None,
        }
    }

    pub fn id(&self) -> TrackableId {
        match *self {
            Self::AutoCreated(id) | Self::AutoRemoved(id) => id,
        }
    }
}

/// Create the channel that carries [`TrackableEvent`]s from the engine's
/// callback thread to the frame thread.
pub fn event_channel() -> (Sender<TrackableEvent>, Receiver<TrackableEvent>) {
    unbounded()
}

/// Geometry of one sub-pattern of a native trackable, in engine convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPatternConfig {
    /// Pattern-to-trackable transform, column-major, right-handed, mm.
    pub matrix: [f32; 16],
    /// Width in millimetres.
    pub width: f32,
    /// Height in millimetres.
    pub height: f32,
    pub image_size_x: i32,
    pub image_size_y: i32,
}

/// Function boundary of the native tracking engine.
///
/// Implementations must be callable from any thread. Poses are 16 floats,
/// column-major, right-handed with Z toward the viewer, in millimetres.
pub trait TrackingEngine: Send + Sync {
    /// True once asynchronous engine initialization has completed, and until
    /// the engine shuts down.
    fn is_initialized(&self) -> bool;

    /// Register a trackable from its configuration string.
    ///
    /// Returns [`NO_ID`] when the engine rejects the configuration.
    fn add_trackable(&self, config: &str) -> TrackableId;

    fn remove_trackable(&self, id: TrackableId) -> bool;

    /// Current pose of a trackable, or `None` if it is not visible this frame.
    fn query_visibility_and_pose(&self, id: TrackableId) -> Option<[f32; 16]>;

    /// Left and right eye poses for stereo video sources.
    fn query_visibility_and_pose_stereo(&self, id: TrackableId) -> Option<([f32; 16], [f32; 16])> {
        self.query_visibility_and_pose(id).map(|m| (m, m))
    }

    /// True when the active video source is a stereo pair.
    fn is_video_stereo(&self) -> bool {
        false
    }

    fn pattern_count(&self, id: TrackableId) -> i32;

    fn pattern_config(&self, id: TrackableId, pattern_index: i32) -> Option<RawPatternConfig>;

    fn set_option_bool(&self, id: TrackableId, option: TrackableOption, value: bool) -> bool;

    fn set_option_float(&self, id: TrackableId, option: TrackableOption, value: f32) -> bool;

    fn option_bool(&self, id: TrackableId, option: TrackableOption) -> Option<bool>;

    fn option_float(&self, id: TrackableId, option: TrackableOption) -> Option<f32>;

    fn option_int(&self, id: TrackableId, option: TrackableOption) -> Option<i32>;

    fn option_string(&self, id: TrackableId, option: TrackableOption) -> Option<String>;
}
