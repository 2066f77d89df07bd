//! Trackable lifecycle state machine.
//!
//! ```text
//!   Unconfigured ──load, engine not ready──▶ PendingEngineInit
//!        │  ▲                                      │
//!        │  └──────────── unload / configure ──────┤
//!        │                                         │ load, engine ready
//!        └──── load, engine ready ─────────┬───────┘
//!                                          ▼
//!                               Loaded  or  LoadError
//! ```
//!
//! `LoadError` is left only through `configure`.

/// Lifecycle of a trackable's registration with the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// Not registered; no load attempted since the last configure/unload.
    #[default]
    Unconfigured,
    /// Load was requested before the engine finished initializing.
    PendingEngineInit,
    /// Registered; the trackable id is valid.
    Loaded,
    /// The engine rejected the configuration.
    LoadError,
}

/// Visibility transition reported by a per-frame update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityChange {
    Found,
    Lost,
}
