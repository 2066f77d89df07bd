//! Session orchestration.
//!
//! This module contains the top-level `ArSession` that owns trackables,
//! origin groups, cameras and tracked objects and runs them once per frame.

mod session;

pub use session::{ArSession, FrameReport, Origin, SessionStatus};
