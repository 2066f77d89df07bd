//! Scene description loaded from YAML.
//!
//! A scene file lists the trackables to register, the origin groups they
//! anchor, the cameras and the content attached to each trackable. Relative
//! data paths are resolved against `asset_root`, which is itself relative to
//! the scene file.

use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use nalgebra::Matrix4;
use serde::Deserialize;
use thiserror::Error;

use crate::origin::FindMode;
use crate::scene::{CameraSettings, ObjectSettings};
use crate::tracking::{ConfigError, TrackableConfig, TrackableOptions};
use crate::viewport::ScreenOrientation;

#[derive(Debug, Error)]
pub enum SceneConfigError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse scene file")]
    Yaml(#[from] serde_yaml::Error),
    #[error("trackable '{tag}': missing '{field}'")]
    MissingField { tag: String, field: &'static str },
    #[error("trackable '{tag}': invalid configuration")]
    InvalidTrackable {
        tag: String,
        #[source]
        source: ConfigError,
    },
    #[error("trackable tag '{0}' is used more than once")]
    DuplicateTag(String),
    #[error("'{owner}' refers to unknown origin '{origin}'")]
    UnknownOrigin { owner: String, origin: String },
    #[error("origin '{0}': transform needs 16 values")]
    BadTransform(String),
}

/// Trackable type names as written in scene files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackableType {
    SquarePattern,
    SquareBarcode,
    MultiMarker,
    Nft,
    TwoDImage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackableEntry {
    pub tag: String,
    #[serde(rename = "type")]
    pub kind: TrackableType,
    /// Square pattern file.
    #[serde(default)]
    pub pattern_file: Option<PathBuf>,
    #[serde(default)]
    pub barcode_id: Option<u64>,
    /// Multimarker config file.
    #[serde(default)]
    pub config_file: Option<PathBuf>,
    /// NFT dataset, without extension.
    #[serde(default)]
    pub dataset: Option<PathBuf>,
    /// 2D image file.
    #[serde(default)]
    pub image: Option<PathBuf>,
    /// Metres.
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub options: TrackableOptions,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindModeName {
    #[default]
    AutoAll,
    AutoByTags,
    Manual,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OriginEntry {
    pub name: String,
    #[serde(default)]
    pub find_mode: FindModeName,
    /// Tags for `auto_by_tags`, or the explicit members for `manual`, in
    /// priority order.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Origin local-to-world transform, 16 values row-major.
    #[serde(default)]
    pub transform: Option<Vec<f64>>,
}

impl OriginEntry {
    pub fn find_mode(&self) -> FindMode {
        match self.find_mode {
            FindModeName::AutoAll => FindMode::AutoAll,
            FindModeName::AutoByTags => FindMode::AutoByTags(self.tags.clone()),
            FindModeName::Manual => FindMode::Manual,
        }
    }

    pub fn local_to_world(&self) -> Result<Matrix4<f64>, SceneConfigError> {
        match &self.transform {
            None => Ok(Matrix4::identity()),
            Some(data) if data.len() == 16 => Ok(Matrix4::from_row_slice(data)),
            Some(_) => Err(SceneConfigError::BadTransform(self.name.clone())),
        }
    }
}

/// Video source and display geometry.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub video_width: u32,
    pub video_height: u32,
    pub screen_width: u32,
    pub screen_height: u32,
    pub orientation: ScreenOrientation,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            video_width: 640,
            video_height: 480,
            screen_width: 1280,
            screen_height: 720,
            orientation: ScreenOrientation::LandscapeLeft,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneConfig {
    #[serde(default)]
    pub asset_root: PathBuf,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub trackables: Vec<TrackableEntry>,
    #[serde(default)]
    pub origins: Vec<OriginEntry>,
    #[serde(default)]
    pub cameras: Vec<CameraSettings>,
    #[serde(default)]
    pub objects: Vec<ObjectSettings>,
}

impl SceneConfig {
    /// Load and check a scene file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SceneConfigError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| SceneConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: SceneConfig = serde_yaml::from_reader(file)?;

        if config.asset_root.is_relative() {
            let base = path.parent().unwrap_or(Path::new(""));
            config.asset_root = base.join(&config.asset_root);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, SceneConfigError> {
        let config: SceneConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Cross-reference checks that serde cannot express.
    pub fn validate(&self) -> Result<(), SceneConfigError> {
        let mut tags = HashSet::new();
        for t in &self.trackables {
            if !tags.insert(t.tag.as_str()) {
                return Err(SceneConfigError::DuplicateTag(t.tag.clone()));
            }
        }

        let origins: HashSet<&str> = self.origins.iter().map(|o| o.name.as_str()).collect();
        for o in &self.origins {
            o.local_to_world()?;
        }
        let owners = self
            .cameras
            .iter()
            .map(|c| (&c.name, &c.origin))
            .chain(self.objects.iter().map(|o| (&o.name, &o.origin)));
        for (owner, origin) in owners {
            if let Some(origin) = origin {
                if !origins.contains(origin.as_str()) {
                    return Err(SceneConfigError::UnknownOrigin {
                        owner: owner.clone(),
                        origin: origin.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl TrackableEntry {
    /// Build the trackable configuration, reading pattern files from
    /// `asset_root`.
    pub fn to_config(&self, asset_root: &Path) -> Result<TrackableConfig, SceneConfigError> {
        let config = match self.kind {
            TrackableType::SquarePattern => {
                let file = self.required(&self.pattern_file, "pattern_file")?;
                TrackableConfig::SquarePattern {
                    pattern: read_pattern(&asset_root.join(file))?,
                    width: self.required(&self.width, "width")?,
                }
            }
            TrackableType::SquareBarcode => TrackableConfig::SquareBarcode {
                barcode_id: self.required(&self.barcode_id, "barcode_id")?,
                width: self.required(&self.width, "width")?,
            },
            TrackableType::MultiMarker => TrackableConfig::MultiMarker {
                config_path: self.required(&self.config_file, "config_file")?,
            },
            TrackableType::Nft => TrackableConfig::Nft {
                dataset: self.required(&self.dataset, "dataset")?,
            },
            TrackableType::TwoDImage => TrackableConfig::TwoDImage {
                image_path: self.required(&self.image, "image")?,
                width: self.required(&self.width, "width")?,
            },
        };
        config
            .validate()
            .map_err(|source| SceneConfigError::InvalidTrackable {
                tag: self.tag.clone(),
                source,
            })?;
        Ok(config)
    }

    fn required<T: Clone>(&self, value: &Option<T>, field: &'static str) -> Result<T, SceneConfigError> {
        value.clone().ok_or_else(|| SceneConfigError::MissingField {
            tag: self.tag.clone(),
            field,
        })
    }
}

/// Read a pattern file into the engine's buffer form: all whitespace-separated
/// values joined by single spaces.
pub fn read_pattern(path: &Path) -> Result<String, SceneConfigError> {
    let text = fs::read_to_string(path).map_err(|source| SceneConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(text.split_whitespace().collect::<Vec<_>>().join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SCENE: &str = r#"
asset_root: data
display:
  video_width: 1280
  video_height: 720
trackables:
  - tag: hiro
    type: square_pattern
    pattern_file: hiro.patt
    width: 0.08
    options: { filtered: true, filter_sample_rate: 60.0 }
  - tag: code3
    type: square_barcode
    barcode_id: 3
    width: 0.05
  - tag: pinball
    type: nft
    dataset: pinball
    enabled: false
origins:
  - name: world
    find_mode: auto_by_tags
    tags: [code3, hiro]
cameras:
  - name: main
    origin: world
    content_mode: fill
objects:
  - name: cube
    trackable: hiro
    origin: world
    seconds_to_remain_visible: 0.5
"#;

    #[test]
    fn test_parse_scene() {
        let config = SceneConfig::from_yaml(SCENE).unwrap();

        assert_eq!(config.asset_root, PathBuf::from("data"));
        assert_eq!(config.display.video_width, 1280);
        assert_eq!(config.display.screen_width, 1280);
        assert_eq!(config.trackables.len(), 3);
        assert!(config.trackables[0].options.filtered);
        assert_eq!(config.trackables[0].options.filter_sample_rate, 60.0);
        assert!(!config.trackables[2].enabled);
        assert_eq!(
            config.origins[0].find_mode(),
            FindMode::AutoByTags(vec!["code3".into(), "hiro".into()])
        );
        assert_eq!(config.origins[0].local_to_world().unwrap(), Matrix4::identity());
        assert_eq!(config.cameras[0].content_mode, crate::viewport::ContentMode::Fill);
        assert_eq!(config.objects[0].seconds_to_remain_visible, 0.5);
    }

    #[test]
    fn test_pattern_file_is_space_joined() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = File::create(dir.path().join("hiro.patt")).unwrap();
        writeln!(f, " 234  235\n\t236\n\n237 ").unwrap();

        let config = SceneConfig::from_yaml(SCENE).unwrap();
        let tc = config.trackables[0].to_config(dir.path()).unwrap();
        assert_eq!(
            tc,
            TrackableConfig::SquarePattern { pattern: "234 235 236 237".into(), width: 0.08 }
        );
    }

    #[test]
    fn test_load_resolves_asset_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.yaml");
        fs::write(&path, SCENE).unwrap();

        let config = SceneConfig::load(&path).unwrap();
        assert_eq!(config.asset_root, dir.path().join("data"));
    }

    #[test]
    fn test_missing_field() {
        let yaml = "trackables:\n  - tag: b\n    type: square_barcode\n    width: 0.05\n";
        let config = SceneConfig::from_yaml(yaml).unwrap();

        let err = config.trackables[0].to_config(Path::new("")).unwrap_err();
        assert!(matches!(err, SceneConfigError::MissingField { field: "barcode_id", .. }));
    }

    #[test]
    fn test_invalid_width() {
        let yaml = "trackables:\n  - tag: b\n    type: square_barcode\n    barcode_id: 1\n    width: -1.0\n";
        let config = SceneConfig::from_yaml(yaml).unwrap();

        let err = config.trackables[0].to_config(Path::new("")).unwrap_err();
        assert!(matches!(err, SceneConfigError::InvalidTrackable { .. }));
    }

    #[test]
    fn test_rejects_bad_references() {
        let dup = "trackables:\n  - {tag: a, type: nft, dataset: x}\n  - {tag: a, type: nft, dataset: y}\n";
        assert!(matches!(SceneConfig::from_yaml(dup), Err(SceneConfigError::DuplicateTag(_))));

        let origin = "cameras:\n  - {name: main, origin: nowhere}\n";
        assert!(matches!(
            SceneConfig::from_yaml(origin),
            Err(SceneConfigError::UnknownOrigin { .. })
        ));

        let transform = "origins:\n  - {name: world, transform: [1.0, 0.0]}\n";
        assert!(matches!(
            SceneConfig::from_yaml(transform),
            Err(SceneConfigError::BadTransform(_))
        ));
    }
}
