//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ComposeError, ComposeResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Timeline construction defaults.
    pub composition: CompositionDefaults,

    /// Export engine defaults.
    pub export: ExportDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Defaults applied while building a timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionDefaults {
    /// Fill color (RGBA, 0.0-1.0) shown where no overlay layer covers a moment.
    pub background_rgba: [f32; 4],

    /// Render canvas size for overlay compositions.
    pub render_width: u32,
    pub render_height: u32,

    /// Frame rate of the rendered overlay output.
    pub frame_rate: u32,

    /// Duration given to still images that report no intrinsic duration.
    pub still_image_secs: f64,

    /// Place `concat` children back to back instead of rejecting them.
    pub sequential_concat: bool,
}

/// Encode profile selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PresetChoice {
    /// Re-encode only when the composition carries overlay instructions.
    Auto,
    /// Copy samples through without re-encoding.
    #[default]
    Passthrough,
    /// Always re-encode.
    Reencode,
}

/// Defaults for the export engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// Encode profile.
    pub preset: PresetChoice,

    /// Output container (e.g. "mov", "mp4").
    pub file_type: String,

    /// Video codec used when re-encoding.
    pub video_codec: String,

    /// Constant rate factor used when re-encoding.
    pub crf: u8,

    /// Replace an existing output file.
    pub overwrite: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "vcompose_core=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for CompositionDefaults {
    fn default() -> Self {
        Self {
            background_rgba: [1.0, 0.5, 0.0, 0.5],
            render_width: 360,
            render_height: 720,
            frame_rate: 30,
            still_image_secs: 3.0,
            sequential_concat: false,
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            preset: PresetChoice::default(),
            file_type: "mov".to_string(),
            video_codec: "libx264".to_string(),
            crf: 20,
            overwrite: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    ///
    /// A file that exists but cannot be read is returned as the second
    /// element so the caller can report it once logging is up.
    pub fn load() -> (Self, Option<ComposeError>) {
        Self::load_or_default(&config_file_path())
    }

    /// Load `path` if it exists; defaults plus the error if it is unusable.
    pub fn load_or_default(path: &Path) -> (Self, Option<ComposeError>) {
        if !path.exists() {
            return (Self::default(), None);
        }
        match Self::load_from(path) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    /// Load config from an explicit file.
    pub fn load_from(path: &Path) -> ComposeResult<Self> {
        if !path.exists() {
            return Err(ComposeError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| ComposeError::config(format!("{}: {e}", path.display())))
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<PathBuf, std::io::Error> {
        let config_path = config_file_path();
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    /// Save config to an explicit file.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("vcompose").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_overlay_profile() {
        let config = AppConfig::default();
        assert_eq!(config.composition.render_width, 360);
        assert_eq!(config.composition.render_height, 720);
        assert_eq!(config.composition.frame_rate, 30);
        assert!(!config.composition.sequential_concat);
        assert_eq!(config.export.preset, PresetChoice::Passthrough);
        assert_eq!(config.export.file_type, "mov");
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"export":{"preset":"auto"}}"#).unwrap();
        assert_eq!(config.export.preset, PresetChoice::Auto);
        assert_eq!(config.export.file_type, "mov");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = std::env::temp_dir().join("vcompose_test_config");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("config.json");

        let mut config = AppConfig::default();
        config.composition.still_image_secs = 5.0;
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert!((loaded.composition.still_image_secs - 5.0).abs() < 1e-9);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_file_falls_back_with_error() {
        let dir = std::env::temp_dir().join("vcompose_test_config_invalid");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let (config, err) = AppConfig::load_or_default(&path);
        assert_eq!(config.composition.render_width, 360);
        assert!(matches!(err, Some(ComposeError::Config { .. })));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_absent_file_is_silent_default() {
        let (config, err) =
            AppConfig::load_or_default(Path::new("/nonexistent/vcompose/config.json"));
        assert!(err.is_none());
        assert_eq!(config.export.file_type, "mov");
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = AppConfig::load_from(Path::new("/nonexistent/vcompose.json")).unwrap_err();
        assert!(matches!(err, ComposeError::FileNotFound { .. }));
    }
}
