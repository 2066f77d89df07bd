//! Geometry utilities: tracker/host frame conventions and rigid poses.

pub mod frames;
pub mod pose;

pub use frames::{M_TO_MM, MM_TO_M, host_pose_from_native, lh_from_rh, rh_from_lh};
pub use pose::{Pose, position_from_matrix, rigid_inverse};
