//! Editor configuration.

use crate::document::{AspectRatio, Background};
use crate::store::{DEFAULT_MIN_BOX_SIZE, FREEHAND_MIN_BOX_SIZE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default width of the editor canvas in pixels.
pub const DEFAULT_CANVAS_WIDTH: i32 = 1100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    /// Minimum size for programmatically created boxes.
    pub min_box_size: i32,
    /// Minimum size for boxes drawn with the pointer.
    pub freehand_min_box_size: i32,
    /// Minimum size for link overlays placed by report generation.
    pub overlay_min_box_size: i32,
    pub layer_debounce_ms: u64,
    pub canvas_width: i32,
    pub default_background: Background,
    pub default_aspect: AspectRatio,
    pub project: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            min_box_size: DEFAULT_MIN_BOX_SIZE,
            freehand_min_box_size: FREEHAND_MIN_BOX_SIZE,
            overlay_min_box_size: DEFAULT_MIN_BOX_SIZE,
            layer_debounce_ms: 200,
            canvas_width: DEFAULT_CANVAS_WIDTH,
            default_background: Background::default(),
            default_aspect: AspectRatio::default(),
            project: "default".to_string(),
        }
    }
}

impl EditorConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Load from the default location, falling back to defaults when the
    /// file does not exist.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// `<config_dir>/intercanvas/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("intercanvas").join("config.json"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let minimums = [
            ("minBoxSize", self.min_box_size),
            ("freehandMinBoxSize", self.freehand_min_box_size),
            ("overlayMinBoxSize", self.overlay_min_box_size),
            ("canvasWidth", self.canvas_width),
        ];
        for (name, value) in minimums {
            if value < 1 {
                return Err(ConfigError::Invalid(format!("{name} must be at least 1, got {value}")));
            }
        }
        if self.layer_debounce_ms == 0 {
            return Err(ConfigError::Invalid("layerDebounceMs must be at least 1".to_string()));
        }
        if self.project.is_empty() {
            return Err(ConfigError::Invalid("project must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn layer_debounce(&self) -> Duration {
        Duration::from_millis(self.layer_debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::BackgroundMode;

    #[test]
    fn test_defaults() {
        let config = EditorConfig::default();
        assert_eq!(config.min_box_size, 16);
        assert_eq!(config.freehand_min_box_size, 40);
        assert_eq!(config.layer_debounce(), Duration::from_millis(200));
        assert_eq!(config.canvas_width, 1100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EditorConfig::from_json(
            r##"{ "layerDebounceMs": 150, "defaultAspect": "4:3",
                  "defaultBackground": { "mode": "radial", "from": "#111", "to": "#222" } }"##,
        )
        .unwrap();
        assert_eq!(config.layer_debounce_ms, 150);
        assert_eq!(config.default_aspect, AspectRatio::new(4, 3).unwrap());
        assert_eq!(config.default_background.mode, BackgroundMode::Radial);
        assert_eq!(config.canvas_width, 1100);
    }

    #[test]
    fn test_rejects_zero_values() {
        assert!(matches!(
            EditorConfig::from_json(r#"{ "layerDebounceMs": 0 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EditorConfig::from_json(r#"{ "canvasWidth": 0 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EditorConfig::from_json(r#"{ "defaultAspect": "wide" }"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "project": "gardens" }"#).unwrap();
        assert_eq!(EditorConfig::load(&path).unwrap().project, "gardens");
        assert!(matches!(
            EditorConfig::load(&dir.path().join("missing.json")),
            Err(ConfigError::Io { .. })
        ));
    }
}
