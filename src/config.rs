//! Mastering configuration
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dsp::{LevelMatcher, MasteringParams, Preset, StageSet};
use crate::engine::ExportFormat;
use crate::error::{MasteringError, Result};
use crate::render::QualityMode;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MasteringConfig {
    /// Shared directory for every session's artifacts
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    #[serde(default)]
    pub preset: Preset,

    #[serde(default)]
    pub quality: QualityMode,

    #[serde(default)]
    pub stages: StageSet,

    #[serde(default = "default_headroom")]
    pub headroom: f64,

    #[serde(default = "default_export_bit_depth")]
    pub export_bit_depth: u16,
}

impl Default for MasteringConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            preset: Preset::default(),
            quality: QualityMode::default(),
            stages: StageSet::default(),
            headroom: default_headroom(),
            export_bit_depth: default_export_bit_depth(),
        }
    }
}

impl MasteringConfig {
    /// Load configuration from a JSON file
    ///
    /// Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: MasteringConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.storage_dir.as_os_str().is_empty() {
            return Err(MasteringError::InvalidParameter {
                param: "storage_dir".to_string(),
                value: String::new(),
                expected: "a directory path".to_string(),
            });
        }
        self.level_matcher()?;
        self.export_format().validate()?;
        Ok(())
    }

    /// Params of the configured preset
    pub fn params(&self) -> MasteringParams {
        self.preset.params()
    }

    /// Level matcher with the configured headroom
    pub fn level_matcher(&self) -> Result<LevelMatcher> {
        LevelMatcher::new(self.headroom)
    }

    pub fn export_format(&self) -> ExportFormat {
        ExportFormat::new(self.export_bit_depth)
    }
}

// Default values
fn default_storage_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_headroom() -> f64 {
    crate::dsp::DEFAULT_HEADROOM
}

fn default_export_bit_depth() -> u16 {
    16
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = MasteringConfig::default();
        assert_eq!(config.storage_dir, PathBuf::from("uploads"));
        assert_eq!(config.preset, Preset::Basic);
        assert_eq!(config.quality, QualityMode::High);
        assert_eq!(config.stages, StageSet::ALL);
        assert_eq!(config.headroom, 0.8);
        assert_eq!(config.export_bit_depth, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: MasteringConfig =
            serde_json::from_str(r#"{ "preset": "professional", "quality": "fast" }"#).unwrap();
        assert_eq!(config.preset, Preset::Professional);
        assert_eq!(config.quality, QualityMode::Fast);
        assert_eq!(config.headroom, 0.8);
        assert_eq!(config.params(), MasteringParams::professional());
    }

    #[test]
    fn test_partial_stage_set() {
        let config: MasteringConfig =
            serde_json::from_str(r#"{ "stages": { "highpass": false, "lowpass": false } }"#)
                .unwrap();
        assert_eq!(config.stages, StageSet::DYNAMICS);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refmaster.json");
        fs::write(&path, r#"{ "storage_dir": "/tmp/masters", "export_bit_depth": 24 }"#).unwrap();

        let config = MasteringConfig::load(&path).unwrap();
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/masters"));
        assert_eq!(config.export_bit_depth, 24);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refmaster.json");

        fs::write(&path, r#"{ "export_bit_depth": 12 }"#).unwrap();
        assert!(MasteringConfig::load(&path).is_err());

        fs::write(&path, r#"{ "headroom": -1.0 }"#).unwrap();
        assert!(MasteringConfig::load(&path).is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = MasteringConfig::load(Path::new("/nonexistent/refmaster.json")).unwrap_err();
        assert_eq!(err.error_code(), "IO_ERROR");
    }
}
