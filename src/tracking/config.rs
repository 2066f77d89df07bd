//! Trackable configuration: one payload per trackable type.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::geometry::M_TO_MM;

/// Type of a trackable as known to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TrackableKind {
    /// Template marker with a square border.
    SquarePattern,
    /// Matrix-code (2D barcode) marker.
    SquareBarcode,
    /// Several square markers rigidly combined.
    MultiMarker,
    /// Natural-feature tracking dataset.
    Nft,
    /// Textured 2D image target.
    TwoDImage,
    /// Not known, e.g. an engine-created trackable of a type we do not map.
    #[default]
    Unknown,
}

impl TrackableKind {
    /// Map the engine's integer type code.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::SquarePattern,
            1 => Self::SquareBarcode,
            2 => Self::MultiMarker,
            3 => Self::Nft,
            4 => Self::TwoDImage,
            _ => Self::Unknown,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::SquarePattern => 0,
            Self::SquareBarcode => 1,
            Self::MultiMarker => 2,
            Self::Nft => 3,
            Self::TwoDImage => 4,
            Self::Unknown => -1,
        }
    }

    /// Square marker types accept square-only options such as continuous
    /// pose estimation.
    pub fn is_square(self) -> bool {
        matches!(self, Self::SquarePattern | Self::SquareBarcode)
    }

    /// Types whose geometry is described by engine-side sub-patterns.
    pub fn has_patterns(self) -> bool {
        matches!(
            self,
            Self::SquarePattern | Self::SquareBarcode | Self::MultiMarker | Self::TwoDImage
        )
    }
}

impl fmt::Display for TrackableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SquarePattern => "square pattern",
            Self::SquareBarcode => "square barcode",
            Self::MultiMarker => "multimarker",
            Self::Nft => "NFT",
            Self::TwoDImage => "2D image",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Invalid configuration, rejected before anything reaches the engine.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("width must be a positive finite number of metres, got {0}")]
    InvalidWidth(f64),
    #[error("square pattern buffer is empty")]
    EmptyPattern,
    #[error("{0} path is empty")]
    EmptyPath(&'static str),
}

/// Type-specific payload of a trackable. Widths are in metres.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackableConfig {
    /// Pattern file contents, whitespace separated.
    SquarePattern { pattern: String, width: f64 },
    SquareBarcode { barcode_id: u64, width: f64 },
    MultiMarker { config_path: PathBuf },
    /// NFT dataset path without extension.
    Nft { dataset: PathBuf },
    TwoDImage { image_path: PathBuf, width: f64 },
}

impl TrackableConfig {
    pub fn kind(&self) -> TrackableKind {
        match self {
            Self::SquarePattern { .. } => TrackableKind::SquarePattern,
            Self::SquareBarcode { .. } => TrackableKind::SquareBarcode,
            Self::MultiMarker { .. } => TrackableKind::MultiMarker,
            Self::Nft { .. } => TrackableKind::Nft,
            Self::TwoDImage { .. } => TrackableKind::TwoDImage,
        }
    }

    /// Check the payload for values that can never load.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::SquarePattern { pattern, width } => {
                check_width(*width)?;
                if pattern.trim().is_empty() {
                    return Err(ConfigError::EmptyPattern);
                }
            }
            Self::SquareBarcode { width, .. } => check_width(*width)?,
            Self::MultiMarker { config_path } => check_path(config_path, "multimarker config")?,
            Self::Nft { dataset } => check_path(dataset, "NFT dataset")?,
            Self::TwoDImage { image_path, width } => {
                check_path(image_path, "2D image")?;
                check_width(*width)?;
            }
        }
        Ok(())
    }

    /// Build the engine configuration string.
    ///
    /// Relative paths are resolved against `asset_root`; widths are sent in
    /// millimetres.
    pub fn engine_config(&self, asset_root: &Path) -> String {
        match self {
            Self::SquarePattern { pattern, width } => {
                format!("single_buffer;{};buffer={}", width_mm(*width), pattern)
            }
            Self::SquareBarcode { barcode_id, width } => {
                format!("single_barcode;{};{}", barcode_id, width_mm(*width))
            }
            Self::MultiMarker { config_path } => {
                format!("multi;{}", asset_root.join(config_path).display())
            }
            Self::Nft { dataset } => format!("nft;{}", asset_root.join(dataset).display()),
            Self::TwoDImage { image_path, width } => format!(
                "2d;{};{}",
                asset_root.join(image_path).display(),
                width_mm(*width)
            ),
        }
    }
}

fn check_width(width: f64) -> Result<(), ConfigError> {
    if width.is_finite() && width > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidWidth(width))
    }
}

fn check_path(path: &Path, what: &'static str) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        Err(ConfigError::EmptyPath(what))
    } else {
        Ok(())
    }
}

/// Metres to the engine's single-precision millimetres.
fn width_mm(width: f64) -> f32 {
    (width * M_TO_MM) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes_round_trip() {
        for kind in [
            TrackableKind::SquarePattern,
            TrackableKind::SquareBarcode,
            TrackableKind::MultiMarker,
            TrackableKind::Nft,
            TrackableKind::TwoDImage,
        ] {
            assert_eq!(TrackableKind::from_code(kind.code()), kind);
        }
        assert_eq!(TrackableKind::from_code(17), TrackableKind::Unknown);
    }

    #[test]
    fn test_engine_config_strings() {
        let root = Path::new("/assets");

        let barcode = TrackableConfig::SquareBarcode { barcode_id: 12, width: 0.08 };
        assert_eq!(barcode.engine_config(root), "single_barcode;12;80");

        let square = TrackableConfig::SquarePattern { pattern: "1 2 3".into(), width: 0.04 };
        assert_eq!(square.engine_config(root), "single_buffer;40;buffer=1 2 3");

        let multi = TrackableConfig::MultiMarker { config_path: "cube.dat".into() };
        assert_eq!(multi.engine_config(root), "multi;/assets/cube.dat");

        let nft = TrackableConfig::Nft { dataset: "/data/pinball".into() };
        assert_eq!(nft.engine_config(root), "nft;/data/pinball");

        let two_d = TrackableConfig::TwoDImage { image_path: "card.jpg".into(), width: 0.15 };
        assert_eq!(two_d.engine_config(root), "2d;/assets/card.jpg;150");
    }

    #[test]
    fn test_validate_rejects_bad_payloads() {
        let bad_width = TrackableConfig::SquareBarcode { barcode_id: 1, width: -0.08 };
        assert_eq!(bad_width.validate(), Err(ConfigError::InvalidWidth(-0.08)));

        let nan_width = TrackableConfig::TwoDImage { image_path: "a.jpg".into(), width: f64::NAN };
        assert!(matches!(nan_width.validate(), Err(ConfigError::InvalidWidth(_))));

        let empty_pattern = TrackableConfig::SquarePattern { pattern: "  ".into(), width: 0.08 };
        assert_eq!(empty_pattern.validate(), Err(ConfigError::EmptyPattern));

        let empty_path = TrackableConfig::MultiMarker { config_path: PathBuf::new() };
        assert!(matches!(empty_path.validate(), Err(ConfigError::EmptyPath(_))));

        let good = TrackableConfig::Nft { dataset: "pinball".into() };
        assert!(good.validate().is_ok());
    }

    #[test]
    fn test_square_gate() {
        assert!(TrackableKind::SquareBarcode.is_square());
        assert!(!TrackableKind::Nft.is_square());
        assert!(!TrackableKind::Nft.has_patterns());
    }
}
