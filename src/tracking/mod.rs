//! Trackables: configuration, lifecycle against the engine, and per-frame
//! pose acquisition.

pub mod config;
pub mod options;
pub mod pattern;
pub mod registry;
pub mod state;
pub mod trackable;

pub use config::{ConfigError, TrackableConfig, TrackableKind};
pub use options::TrackableOptions;
pub use pattern::Pattern;
pub use registry::{RegistryChange, TrackableRegistry};
pub use state::{LifecycleState, VisibilityChange};
pub use trackable::{Trackable, TrackableSnapshot};
