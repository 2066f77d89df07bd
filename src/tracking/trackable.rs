//! A single tracked target and its registration with the engine.
//!
//! All mutable state of a [`Trackable`] sits behind one `parking_lot::Mutex`.
//! Load, unload, the per-frame pose query and option pushes each hold that
//! lock for their whole engine round trip, so a render thread calling
//! [`Trackable::update`] and a lifecycle thread calling [`Trackable::unload`]
//! never observe a half-registered trackable.

use std::path::PathBuf;
use std::sync::Arc;

use nalgebra::Matrix4;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::engine::{NO_ID, TrackableId, TrackableOption, TrackingEngine};
use crate::geometry::{MM_TO_M, host_pose_from_native};

use super::config::{ConfigError, TrackableConfig, TrackableKind};
use super::options::TrackableOptions;
use super::pattern::{Pattern, fetch_patterns};
use super::state::{LifecycleState, VisibilityChange};

/// Consistent view of a trackable's per-frame output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackableSnapshot {
    pub id: TrackableId,
    pub kind: TrackableKind,
    pub state: LifecycleState,
    pub visible: bool,
    /// Last observed pose (left eye), host convention. Stale when not visible.
    pub pose: Matrix4<f64>,
    /// Right-eye pose; equals `pose` for mono video.
    pub pose_right: Matrix4<f64>,
}

struct TrackableInner {
    id: TrackableId,
    kind: TrackableKind,
    config: Option<TrackableConfig>,
    options: TrackableOptions,
    state: LifecycleState,
    enabled: bool,
    visible: bool,
    pose: Matrix4<f64>,
    pose_right: Matrix4<f64>,
    patterns: Vec<Pattern>,
}

impl TrackableInner {
    fn new(kind: TrackableKind, config: Option<TrackableConfig>) -> Self {
        Self {
            id: NO_ID,
            kind,
            config,
            options: TrackableOptions::default(),
            state: LifecycleState::Unconfigured,
            enabled: true,
            visible: false,
            pose: Matrix4::identity(),
            pose_right: Matrix4::identity(),
            patterns: Vec::new(),
        }
    }
}

/// One tracked target.
pub struct Trackable {
    tag: String,
    engine: Arc<dyn TrackingEngine>,
    asset_root: PathBuf,
    inner: Mutex<TrackableInner>,
}

impl Trackable {
    /// Create an unconfigured trackable.
    pub fn new(tag: impl Into<String>, engine: Arc<dyn TrackingEngine>) -> Self {
        Self {
            tag: tag.into(),
            engine,
            asset_root: PathBuf::new(),
            inner: Mutex::new(TrackableInner::new(TrackableKind::Unknown, None)),
        }
    }

    /// Create a configured trackable. It is not loaded until
    /// [`load`](Self::load) or the first [`update`](Self::update).
    pub fn with_config(
        tag: impl Into<String>,
        config: TrackableConfig,
        engine: Arc<dyn TrackingEngine>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let trackable = Self::new(tag, engine);
        *trackable.inner.lock() = TrackableInner::new(config.kind(), Some(config));
        Ok(trackable)
    }

    /// Directory that relative data paths are resolved against.
    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = root.into();
        self
    }

    /// Wrap a trackable the engine created on its own.
    ///
    /// The type is read back from the engine. Barcode markers get a full
    /// configuration so they can be reloaded after an unload.
    pub fn adopt(id: TrackableId, engine: Arc<dyn TrackingEngine>) -> Self {
        let kind = engine
            .option_int(id, TrackableOption::Type)
            .map_or(TrackableKind::Unknown, TrackableKind::from_code);

        let width = engine
            .option_float(id, TrackableOption::SquareWidth)
            .map(|w| f64::from(w) * MM_TO_M);
        let barcode_id = engine
            .option_string(id, TrackableOption::SquareBarcodeId)
            .and_then(|s| s.trim().parse::<u64>().ok());

        let config = match (kind, barcode_id, width) {
            (TrackableKind::SquareBarcode, Some(barcode_id), Some(width)) => {
                Some(TrackableConfig::SquareBarcode { barcode_id, width })
            }
            _ => None,
        };
        let tag = match barcode_id {
            Some(b) if kind == TrackableKind::SquareBarcode => format!("barcode_{}", b),
            _ => format!("auto_{}", id.0),
        };

        let mut inner = TrackableInner::new(kind, config);
        inner.id = id;
        inner.state = LifecycleState::Loaded;
        inner.patterns = fetch_patterns(engine.as_ref(), id);

        Self {
            tag,
            engine,
            asset_root: PathBuf::new(),
            inner: Mutex::new(inner),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Replace the configuration.
    ///
    /// A loaded trackable is unloaded first. The new configuration is not
    /// loaded here.
    pub fn configure(&self, config: TrackableConfig) -> Result<(), ConfigError> {
        config.validate()?;

        let mut inner = self.inner.lock();
        self.unload_locked(&mut inner);
        inner.kind = config.kind();
        inner.config = Some(config);
        inner.state = LifecycleState::Unconfigured;
        Ok(())
    }

    /// Register with the engine if possible. Returns the resulting state.
    ///
    /// Cheap to call every frame: a loaded trackable returns immediately, and
    /// an uninitialized engine only moves the state to `PendingEngineInit`.
    pub fn load(&self) -> LifecycleState {
        let mut inner = self.inner.lock();
        self.load_locked(&mut inner)
    }

    fn load_locked(&self, inner: &mut TrackableInner) -> LifecycleState {
        if matches!(inner.state, LifecycleState::Loaded | LifecycleState::LoadError) {
            return inner.state;
        }
        if !inner.enabled {
            return inner.state;
        }
        if !self.engine.is_initialized() {
            if inner.state != LifecycleState::PendingEngineInit {
                debug!("{}: engine not initialized, load deferred", self.tag);
            }
            inner.state = LifecycleState::PendingEngineInit;
            return inner.state;
        }
        let Some(config) = inner.config.as_ref() else {
            return inner.state;
        };

        let config_string = config.engine_config(&self.asset_root);
        let id = self.engine.add_trackable(&config_string);
        if !id.is_valid() {
            warn!("{}: engine rejected {} configuration '{}'", self.tag, inner.kind, config_string);
            inner.state = LifecycleState::LoadError;
            return inner.state;
        }

        inner.id = id;
        inner.state = LifecycleState::Loaded;
        self.push_options(inner);
        if inner.kind.has_patterns() {
            inner.patterns = fetch_patterns(self.engine.as_ref(), id);
        }
        info!("{}: loaded {} as {} ({} patterns)", self.tag, inner.kind, id, inner.patterns.len());
        inner.state
    }

    fn push_options(&self, inner: &TrackableInner) {
        let id = inner.id;
        let opts = inner.options;
        self.engine.set_option_bool(id, TrackableOption::Filtered, opts.filtered);
        self.engine
            .set_option_float(id, TrackableOption::FilterSampleRate, opts.filter_sample_rate);
        self.engine
            .set_option_float(id, TrackableOption::FilterCutoffFreq, opts.filter_cutoff_freq);
        if inner.kind.is_square() {
            self.engine.set_option_bool(
                id,
                TrackableOption::SquareUseContPoseEstimation,
                opts.use_continuous_pose,
            );
        }
        if inner.kind == TrackableKind::Nft {
            self.engine.set_option_float(id, TrackableOption::NftScale, opts.nft_scale);
        }
    }

    /// Per-frame pose query.
    ///
    /// Lazily loads an unconfigured or deferred trackable. Returns the
    /// visibility transition, if any.
    pub fn update(&self) -> Option<VisibilityChange> {
        let mut inner = self.inner.lock();
        if inner.state == LifecycleState::Loaded && !self.engine.is_initialized() {
            // The engine dropped every trackable when it shut down.
            let was_visible = inner.visible;
            debug!("{}: engine shut down, forgetting {}", self.tag, inner.id);
            Self::reset(&mut inner);
            return was_visible.then_some(VisibilityChange::Lost);
        }
        if matches!(
            inner.state,
            LifecycleState::Unconfigured | LifecycleState::PendingEngineInit
        ) {
            self.load_locked(&mut inner);
        }
        if inner.state != LifecycleState::Loaded {
            return None;
        }

        let was_visible = inner.visible;
        let poses = if self.engine.is_video_stereo() {
            self.engine.query_visibility_and_pose_stereo(inner.id)
        } else {
            self.engine.query_visibility_and_pose(inner.id).map(|m| (m, m))
        };

        match poses {
            Some((left, right)) => {
                inner.pose = host_pose_from_native(&left);
                inner.pose_right = host_pose_from_native(&right);
                inner.visible = true;
            }
            None => inner.visible = false,
        }

        match (was_visible, inner.visible) {
            (false, true) => Some(VisibilityChange::Found),
            (true, false) => Some(VisibilityChange::Lost),
            _ => None,
        }
    }

    /// Release the engine registration. No-op when not registered.
    pub fn unload(&self) {
        let mut inner = self.inner.lock();
        self.unload_locked(&mut inner);
    }

    fn unload_locked(&self, inner: &mut TrackableInner) {
        if !inner.id.is_valid() {
            return;
        }
        // After a global engine shutdown the native trackable is already gone.
        if self.engine.is_initialized() && !self.engine.remove_trackable(inner.id) {
            debug!("{}: engine had no trackable {}", self.tag, inner.id);
        }
        info!("{}: unloaded {}", self.tag, inner.id);
        Self::reset(inner);
    }

    /// Forget the registration without calling the engine, for trackables
    /// the engine already removed. The trackable is also disabled so it is
    /// not loaded again.
    pub fn detach(&self) {
        let mut inner = self.inner.lock();
        Self::reset(&mut inner);
        inner.enabled = false;
    }

    fn reset(inner: &mut TrackableInner) {
        inner.id = NO_ID;
        inner.patterns.clear();
        inner.visible = false;
        inner.state = LifecycleState::Unconfigured;
    }

    /// Disabling unloads; enabling allows the next load.
    pub fn set_enabled(&self, enabled: bool) {
        let mut inner = self.inner.lock();
        inner.enabled = enabled;
        if !enabled {
            self.unload_locked(&mut inner);
            if inner.state == LifecycleState::PendingEngineInit {
                inner.state = LifecycleState::Unconfigured;
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.lock().enabled
    }

    pub fn set_filtered(&self, value: bool) {
        self.set_option(|o| o.filtered = value, |engine, id, _| {
            engine.set_option_bool(id, TrackableOption::Filtered, value);
        });
    }

    pub fn set_filter_sample_rate(&self, value: f32) {
        self.set_option(|o| o.filter_sample_rate = value, |engine, id, _| {
            engine.set_option_float(id, TrackableOption::FilterSampleRate, value);
        });
    }

    pub fn set_filter_cutoff_freq(&self, value: f32) {
        self.set_option(|o| o.filter_cutoff_freq = value, |engine, id, _| {
            engine.set_option_float(id, TrackableOption::FilterCutoffFreq, value);
        });
    }

    /// Square marker types only; recorded but not pushed for other types.
    pub fn set_use_continuous_pose(&self, value: bool) {
        self.set_option(|o| o.use_continuous_pose = value, |engine, id, kind| {
            if kind.is_square() {
                engine.set_option_bool(id, TrackableOption::SquareUseContPoseEstimation, value);
            }
        });
    }

    /// NFT only; recorded but not pushed for other types.
    pub fn set_nft_scale(&self, value: f32) {
        self.set_option(|o| o.nft_scale = value, |engine, id, kind| {
            if kind == TrackableKind::Nft {
                engine.set_option_float(id, TrackableOption::NftScale, value);
            }
        });
    }

    /// Replace all pending options at once, pushing them if loaded.
    pub fn set_options(&self, options: TrackableOptions) {
        let mut inner = self.inner.lock();
        inner.options = options;
        if inner.id.is_valid() {
            self.push_options(&inner);
        }
    }

    fn set_option(
        &self,
        record: impl FnOnce(&mut TrackableOptions),
        push: impl FnOnce(&dyn TrackingEngine, TrackableId, TrackableKind),
    ) {
        let mut inner = self.inner.lock();
        record(&mut inner.options);
        if inner.id.is_valid() {
            push(self.engine.as_ref(), inner.id, inner.kind);
        }
    }

    pub fn options(&self) -> TrackableOptions {
        self.inner.lock().options
    }

    pub fn id(&self) -> TrackableId {
        self.inner.lock().id
    }

    pub fn kind(&self) -> TrackableKind {
        self.inner.lock().kind
    }

    pub fn config(&self) -> Option<TrackableConfig> {
        self.inner.lock().config.clone()
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.lock().state
    }

    pub fn is_visible(&self) -> bool {
        self.inner.lock().visible
    }

    /// Last observed pose in host convention. Only meaningful while visible.
    pub fn pose(&self) -> Matrix4<f64> {
        self.inner.lock().pose
    }

    pub fn pose_right(&self) -> Matrix4<f64> {
        self.inner.lock().pose_right
    }

    pub fn patterns(&self) -> Vec<Pattern> {
        self.inner.lock().patterns.clone()
    }

    /// Read id, state, visibility and poses under a single lock.
    pub fn snapshot(&self) -> TrackableSnapshot {
        let inner = self.inner.lock();
        TrackableSnapshot {
            id: inner.id,
            kind: inner.kind,
            state: inner.state,
            visible: inner.visible,
            pose: inner.pose,
            pose_right: inner.pose_right,
        }
    }
}

impl std::fmt::Debug for Trackable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Trackable")
            .field("tag", &self.tag)
            .field("id", &inner.id)
            .field("kind", &inner.kind)
            .field("state", &inner.state)
            .field("visible", &inner.visible)
            .finish()
    }
}
