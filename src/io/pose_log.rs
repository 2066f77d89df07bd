//! Recorded pose logs for replaying a tracking session without a camera.
//!
//! CSV, one row per trackable per frame:
//!
//! ```text
//! frame,tag,visible,m0,m1,...,m15
//! 0,hiro,1,1,0,0,0,0,1,0,0,0,0,1,0,12.5,-3.0,-480.0,1
//! ```
//!
//! `m0..m15` is the native pose: column-major, right-handed, millimetres.
//! Matrix columns may be left empty on rows where `visible` is 0.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use csv::ReaderBuilder;
use tracing::warn;

use crate::engine::{SimulatedEngine, TrackableId};

#[derive(Debug, Clone, PartialEq)]
pub struct PoseRecord {
    pub frame: u64,
    pub tag: String,
    /// Native pose, or `None` when not visible.
    pub pose: Option<[f32; 16]>,
}

/// Pose records grouped by frame.
#[derive(Debug, Default)]
pub struct PoseLog {
    frames: BTreeMap<u64, Vec<PoseRecord>>,
}

impl PoseLog {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let rdr = ReaderBuilder::new()
            .has_headers(true)
            .comment(Some(b'#'))
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        Self::from_reader(rdr).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_csv(text: &str) -> Result<Self> {
        let rdr = ReaderBuilder::new()
            .has_headers(true)
            .comment(Some(b'#'))
            .flexible(true)
            .from_reader(text.as_bytes());
        Self::from_reader(rdr)
    }

    fn from_reader<R: std::io::Read>(mut rdr: csv::Reader<R>) -> Result<Self> {
        let mut log = Self::default();
        for (line, rec) in rdr.records().enumerate() {
            let rec = rec?;
            if rec.len() < 3 {
                warn!("pose log row {}: too few columns, skipped", line + 1);
                continue;
            }
            let frame: u64 = rec[0].trim().parse()?;
            let tag = rec[1].trim().to_string();
            let visible = parse_flag(rec[2].trim())
                .with_context(|| format!("row {}: bad visible flag", line + 1))?;

            let pose = if visible {
                if rec.len() < 19 {
                    bail!("row {}: visible pose needs 16 matrix values", line + 1);
                }
                let mut m = [0.0f32; 16];
                for (i, v) in m.iter_mut().enumerate() {
                    *v = rec[3 + i].trim().parse()?;
                }
                Some(m)
            } else {
                None
            };

            log.frames.entry(frame).or_default().push(PoseRecord { frame, tag, pose });
        }
        Ok(log)
    }

    /// One past the last recorded frame number.
    pub fn frame_count(&self) -> u64 {
        self.frames.keys().next_back().map_or(0, |last| last.saturating_add(1))
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn records(&self, frame: u64) -> &[PoseRecord] {
        self.frames.get(&frame).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Feed one frame's poses into the simulated engine.
    ///
    /// Every trackable starts the frame invisible; only recorded visible rows
    /// set a pose. Returns the number of poses set.
    pub fn apply(
        &self,
        frame: u64,
        engine: &SimulatedEngine,
        lookup: impl Fn(&str) -> Option<TrackableId>,
    ) -> usize {
        engine.clear_poses();
        let mut applied = 0;
        for rec in self.records(frame) {
            let Some(id) = lookup(&rec.tag).filter(|id| id.is_valid()) else {
                continue;
            };
            if rec.pose.is_some() {
                engine.set_pose(id, rec.pose);
                applied += 1;
            }
        }
        applied
    }
}

fn parse_flag(s: &str) -> Result<bool> {
    match s {
        "1" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "false" | "FALSE" | "False" => Ok(false),
        other => bail!("expected 0/1 or true/false, got '{}'", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TrackingEngine;

    const LOG: &str = "\
frame,tag,visible,m0,m1,m2,m3,m4,m5,m6,m7,m8,m9,m10,m11,m12,m13,m14,m15
0,hiro,1,1,0,0,0,0,1,0,0,0,0,1,0,10,20,-500,1
0,kanji,0
# dropped frame
2,hiro,true,1,0,0,0,0,1,0,0,0,0,1,0,0,0,-400,1
";

    #[test]
    fn test_parse_log() {
        let log = PoseLog::from_csv(LOG).unwrap();

        assert_eq!(log.frame_count(), 3);
        assert_eq!(log.records(0).len(), 2);
        assert!(log.records(1).is_empty());
        assert_eq!(log.records(0)[0].pose.unwrap()[14], -500.0);
        assert!(log.records(0)[1].pose.is_none());
        assert_eq!(log.records(2)[0].tag, "hiro");
    }

    #[test]
    fn test_rejects_short_visible_row() {
        assert!(PoseLog::from_csv("frame,tag,visible\n0,hiro,1,1,0\n").is_err());
        assert!(PoseLog::from_csv("frame,tag,visible\n0,hiro,maybe\n").is_err());
    }

    #[test]
    fn test_apply_sets_and_clears_poses() {
        let log = PoseLog::from_csv(LOG).unwrap();
        let engine = SimulatedEngine::initialized();
        let hiro = engine.add_trackable("single_barcode;1;80");

        let lookup = |tag: &str| (tag == "hiro").then_some(hiro);
        assert_eq!(log.apply(0, &engine, lookup), 1);
        assert!(engine.query_visibility_and_pose(hiro).is_some());

        assert_eq!(log.apply(1, &engine, lookup), 0);
        assert!(engine.query_visibility_and_pose(hiro).is_none());
    }

    #[test]
    fn test_frame_count_saturates() {
        let log = PoseLog::from_csv("frame,tag,visible\n18446744073709551615,hiro,0\n").unwrap();
        assert_eq!(log.frame_count(), u64::MAX);
        assert_eq!(log.records(u64::MAX).len(), 1);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poses.csv");
        std::fs::write(&path, LOG).unwrap();

        let log = PoseLog::load(&path).unwrap();
        assert_eq!(log.frame_count(), 3);
        assert!(PoseLog::load(dir.path().join("missing.csv")).is_err());
    }
}
