pub mod pose_log;

pub use pose_log::{PoseLog, PoseRecord};
