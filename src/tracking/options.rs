//! Per-trackable tuning options.

use serde::Deserialize;

pub const DEFAULT_FILTER_SAMPLE_RATE: f32 = 30.0;
pub const DEFAULT_FILTER_CUTOFF_FREQ: f32 = 15.0;
pub const DEFAULT_NFT_SCALE: f32 = 1.0;

/// Option values as last set by the application.
///
/// These are the pending values: they are held here until the trackable is
/// registered and then pushed to the engine, and every later change is
/// pushed immediately.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackableOptions {
    /// Pose filtering on/off.
    pub filtered: bool,
    /// Expected frame rate for the pose filter, in Hz.
    pub filter_sample_rate: f32,
    /// Filter cutoff frequency, in Hz.
    pub filter_cutoff_freq: f32,
    /// Square and barcode markers only.
    pub use_continuous_pose: bool,
    /// NFT only.
    pub nft_scale: f32,
}

impl Default for TrackableOptions {
    fn default() -> Self {
        Self {
            filtered: false,
            filter_sample_rate: DEFAULT_FILTER_SAMPLE_RATE,
            filter_cutoff_freq: DEFAULT_FILTER_CUTOFF_FREQ,
            use_continuous_pose: false,
            nft_scale: DEFAULT_NFT_SCALE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let opts: TrackableOptions = serde_yaml::from_str("filtered: true\nnft_scale: 2.5").unwrap();

        assert!(opts.filtered);
        assert_eq!(opts.nft_scale, 2.5);
        assert_eq!(opts.filter_sample_rate, DEFAULT_FILTER_SAMPLE_RATE);
        assert_eq!(opts.filter_cutoff_freq, DEFAULT_FILTER_CUTOFF_FREQ);
        assert!(!opts.use_continuous_pose);
    }
}
