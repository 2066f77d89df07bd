//! In-process stand-in for the native tracking engine.
//!
//! `SimulatedEngine` accepts the same configuration strings as the native
//! engine, hands out sequential ids, and reports whatever poses it was last
//! told to report. It is used to replay recorded sessions and to exercise the
//! trackable lifecycle without native code. Every boundary call is counted so
//! callers can assert on engine traffic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{RawPatternConfig, TrackableEvent, TrackableId, TrackableOption, TrackingEngine, NO_ID};

/// Native type codes reported through [`TrackableOption::Type`].
const TYPE_SQUARE: i32 = 0;
const TYPE_SQUARE_BARCODE: i32 = 1;
const TYPE_MULTIMARKER: i32 = 2;
const TYPE_NFT: i32 = 3;
const TYPE_TWO_D: i32 = 4;

/// Pixel size reported for square pattern images.
const PATTERN_IMAGE_SIZE: i32 = 16;

/// Snapshot of how many times each boundary call was made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub add_trackable: usize,
    pub remove_trackable: usize,
    pub query_pose: usize,
    pub set_option: usize,
    pub pattern_config: usize,
}

#[derive(Default)]
struct Counters {
    add_trackable: AtomicUsize,
    remove_trackable: AtomicUsize,
    query_pose: AtomicUsize,
    set_option: AtomicUsize,
    pattern_config: AtomicUsize,
}

struct SimTrackable {
    config: String,
    type_code: i32,
    pose: Option<([f32; 16], [f32; 16])>,
    bools: HashMap<TrackableOption, bool>,
    floats: HashMap<TrackableOption, f32>,
    strings: HashMap<TrackableOption, String>,
    patterns: Vec<RawPatternConfig>,
}

impl SimTrackable {
    fn new(config: &str, type_code: i32) -> Self {
        Self {
            config: config.to_string(),
            type_code,
            pose: None,
            bools: HashMap::new(),
            floats: HashMap::new(),
            strings: HashMap::new(),
            patterns: Vec::new(),
        }
    }
}

struct SimState {
    initialized: bool,
    stereo: bool,
    next_id: i32,
    trackables: HashMap<TrackableId, SimTrackable>,
    rejected_fragments: Vec<String>,
    events: Option<Sender<TrackableEvent>>,
}

/// Simulated tracking engine.
pub struct SimulatedEngine {
    state: Mutex<SimState>,
    counters: Counters,
}

impl SimulatedEngine {
    /// Create an engine that has not finished initializing yet.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                initialized: false,
                stereo: false,
                next_id: 0,
                trackables: HashMap::new(),
                rejected_fragments: Vec::new(),
                events: None,
            }),
            counters: Counters::default(),
        }
    }

    /// Create an engine that is already initialized.
    pub fn initialized() -> Self {
        let engine = Self::new();
        engine.set_initialized(true);
        engine
    }

    pub fn set_initialized(&self, value: bool) {
        self.state.lock().initialized = value;
    }

    pub fn set_stereo(&self, value: bool) {
        self.state.lock().stereo = value;
    }

    /// Make `add_trackable` fail for any configuration containing `fragment`
    /// (e.g. a missing data file).
    pub fn reject_configs_containing(&self, fragment: &str) {
        self.state.lock().rejected_fragments.push(fragment.to_string());
    }

    /// Register the sender that receives auto-created / auto-removed events.
    pub fn subscribe(&self, sender: Sender<TrackableEvent>) {
        self.state.lock().events = Some(sender);
    }

    /// Set the pose reported for `id`, or `None` for "not visible".
    ///
    /// Both eyes report the same matrix.
    pub fn set_pose(&self, id: TrackableId, pose: Option<[f32; 16]>) {
        self.set_pose_stereo(id, pose.map(|m| (m, m)));
    }

    pub fn set_pose_stereo(&self, id: TrackableId, pose: Option<([f32; 16], [f32; 16])>) {
        let mut state = self.state.lock();
        match state.trackables.get_mut(&id) {
            Some(t) => t.pose = pose,
            None => debug!("SimulatedEngine: set_pose for unknown {}", id),
        }
    }

    /// Mark every registered trackable as not visible.
    pub fn clear_poses(&self) {
        for t in self.state.lock().trackables.values_mut() {
            t.pose = None;
        }
    }

    /// Simulate detection of an unconfigured matrix code.
    ///
    /// Registers a barcode trackable and announces it on the event channel
    /// as the native engine's callback thread would.
    pub fn auto_create_barcode(&self, barcode_id: u64, width_mm: f32) -> TrackableId {
        let id = self.add_trackable(&format!("single_barcode;{};{}", barcode_id, width_mm));
        if id.is_valid() {
            self.emit(TrackableEvent::AutoCreated(id));
        }
        id
    }

    /// Simulate the engine dropping a trackable on its own.
    pub fn auto_remove(&self, id: TrackableId) {
        let removed = self.state.lock().trackables.remove(&id).is_some();
        if removed {
            self.emit(TrackableEvent::AutoRemoved(id));
        }
    }

    /// Global shutdown: all native trackables are released implicitly.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        state.trackables.clear();
        state.initialized = false;
    }

    /// Configuration string a trackable was registered with.
    pub fn config_of(&self, id: TrackableId) -> Option<String> {
        self.state.lock().trackables.get(&id).map(|t| t.config.clone())
    }

    pub fn contains(&self, id: TrackableId) -> bool {
        self.state.lock().trackables.contains_key(&id)
    }

    pub fn num_trackables(&self) -> usize {
        self.state.lock().trackables.len()
    }

    /// Current call counters.
    pub fn call_counts(&self) -> CallCounts {
        CallCounts {
            add_trackable: self.counters.add_trackable.load(Ordering::SeqCst),
            remove_trackable: self.counters.remove_trackable.load(Ordering::SeqCst),
            query_pose: self.counters.query_pose.load(Ordering::SeqCst),
            set_option: self.counters.set_option.load(Ordering::SeqCst),
            pattern_config: self.counters.pattern_config.load(Ordering::SeqCst),
        }
    }

    fn emit(&self, event: TrackableEvent) {
        let sender = self.state.lock().events.clone();
        if let Some(sender) = sender {
            if sender.send(event).is_err() {
                warn!("SimulatedEngine: event receiver dropped, {:?} lost", event);
            }
        }
    }
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a native configuration string into a simulated trackable.
fn parse_config(config: &str) -> Option<SimTrackable> {
    let fields: Vec<&str> = config.split(';').collect();
    let non_empty = |i: usize| fields.get(i).map(|s| s.trim()).filter(|s| !s.is_empty());

    match fields.first().copied()? {
        "single_buffer" => {
            let width: f32 = non_empty(1)?.parse().ok()?;
            let buffer = non_empty(2)?.strip_prefix("buffer=")?;
            if buffer.trim().is_empty() || width <= 0.0 {
                return None;
            }
            let mut t = SimTrackable::new(config, TYPE_SQUARE);
            t.floats.insert(TrackableOption::SquareWidth, width);
            t.patterns.push(square_pattern(width, PATTERN_IMAGE_SIZE));
            Some(t)
        }
        "single_barcode" => {
            let barcode: u64 = non_empty(1)?.parse().ok()?;
            let width: f32 = non_empty(2)?.parse().ok()?;
            if width <= 0.0 {
                return None;
            }
            let mut t = SimTrackable::new(config, TYPE_SQUARE_BARCODE);
            t.floats.insert(TrackableOption::SquareWidth, width);
            t.strings.insert(TrackableOption::SquareBarcodeId, barcode.to_string());
            t.patterns.push(square_pattern(width, 0));
            Some(t)
        }
        "multi" => {
            non_empty(1)?;
            Some(SimTrackable::new(config, TYPE_MULTIMARKER))
        }
        "nft" => {
            non_empty(1)?;
            let mut t = SimTrackable::new(config, TYPE_NFT);
            t.floats.insert(TrackableOption::NftScale, 1.0);
            Some(t)
        }
        "2d" => {
            non_empty(1)?;
            let width: f32 = non_empty(2)?.parse().ok()?;
            if width <= 0.0 {
                return None;
            }
            let mut t = SimTrackable::new(config, TYPE_TWO_D);
            t.floats.insert(TrackableOption::TwoDScale, width);
            t.patterns.push(square_pattern(width, 0));
            Some(t)
        }
        _ => None,
    }
}

fn square_pattern(width_mm: f32, image_size: i32) -> RawPatternConfig {
    let mut matrix = [0.0f32; 16];
    matrix[0] = 1.0;
    matrix[5] = 1.0;
    matrix[10] = 1.0;
    matrix[15] = 1.0;
    RawPatternConfig {
        matrix,
        width: width_mm,
        height: width_mm,
        image_size_x: image_size,
        image_size_y: image_size,
    }
}

impl TrackingEngine for SimulatedEngine {
    fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    fn add_trackable(&self, config: &str) -> TrackableId {
        self.counters.add_trackable.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state.lock();
        if !state.initialized {
            return NO_ID;
        }
        if state.rejected_fragments.iter().any(|f| config.contains(f.as_str())) {
            debug!("SimulatedEngine: rejecting '{}'", config);
            return NO_ID;
        }
        let Some(trackable) = parse_config(config) else {
            debug!("SimulatedEngine: malformed config '{}'", config);
            return NO_ID;
        };

        let id = TrackableId::new(state.next_id);
        state.next_id += 1;
        state.trackables.insert(id, trackable);
        id
    }

    fn remove_trackable(&self, id: TrackableId) -> bool {
        self.counters.remove_trackable.fetch_add(1, Ordering::SeqCst);
        self.state.lock().trackables.remove(&id).is_some()
    }

    fn query_visibility_and_pose(&self, id: TrackableId) -> Option<[f32; 16]> {
        self.counters.query_pose.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        state.trackables.get(&id)?.pose.map(|(left, _)| left)
    }

    fn query_visibility_and_pose_stereo(&self, id: TrackableId) -> Option<([f32; 16], [f32; 16])> {
        self.counters.query_pose.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        state.trackables.get(&id)?.pose
    }

    fn is_video_stereo(&self) -> bool {
        self.state.lock().stereo
    }

    fn pattern_count(&self, id: TrackableId) -> i32 {
        let state = self.state.lock();
        state
            .trackables
            .get(&id)
            .map_or(0, |t| t.patterns.len() as i32)
    }

    fn pattern_config(&self, id: TrackableId, pattern_index: i32) -> Option<RawPatternConfig> {
        self.counters.pattern_config.fetch_add(1, Ordering::SeqCst);
        let index = usize::try_from(pattern_index).ok()?;
        let state = self.state.lock();
        state.trackables.get(&id)?.patterns.get(index).copied()
    }

    fn set_option_bool(&self, id: TrackableId, option: TrackableOption, value: bool) -> bool {
        self.counters.set_option.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        match state.trackables.get_mut(&id) {
            Some(t) => {
                t.bools.insert(option, value);
                true
            }
            None => false,
        }
    }

    fn set_option_float(&self, id: TrackableId, option: TrackableOption, value: f32) -> bool {
        self.counters.set_option.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        match state.trackables.get_mut(&id) {
            Some(t) => {
                t.floats.insert(option, value);
                true
            }
            None => false,
        }
    }

    fn option_bool(&self, id: TrackableId, option: TrackableOption) -> Option<bool> {
        self.state.lock().trackables.get(&id)?.bools.get(&option).copied()
    }

    fn option_float(&self, id: TrackableId, option: TrackableOption) -> Option<f32> {
        self.state.lock().trackables.get(&id)?.floats.get(&option).copied()
    }

    fn option_int(&self, id: TrackableId, option: TrackableOption) -> Option<i32> {
        let state = self.state.lock();
        let t = state.trackables.get(&id)?;
        match option {
            TrackableOption::Type => Some(t.type_code),
            _ => None,
        }
    }

    fn option_string(&self, id: TrackableId, option: TrackableOption) -> Option<String> {
        self.state.lock().trackables.get(&id)?.strings.get(&option).cloned()
    }
}
