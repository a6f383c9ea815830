use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engines::{CloudConfig, Device, EngineMode, ModelChoice};
use crate::extract::ExtractionMethod;
use crate::language::Language;
use crate::validate::ValidationThresholds;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Settings for a [`crate::Pipeline`].
///
/// Every field has a default, so a config file only needs the values it
/// changes:
///
/// ```json
/// { "language": "tamil", "mode": "clone", "device": "cpu" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Language name; unknown names synthesize in Hindi.
    pub language: String,
    pub mode: EngineMode,
    pub extraction: ExtractionMethod,
    pub validation: ValidationThresholds,
    pub models: ModelChoice,
    /// `None` detects the device when an engine is built.
    pub device: Option<Device>,
    pub cloud: CloudConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            language: Language::default().name().to_string(),
            mode: EngineMode::default(),
            extraction: ExtractionMethod::default(),
            validation: ValidationThresholds::default(),
            models: ModelChoice::default(),
            device: None,
            cloud: CloudConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{ "language": "tamil", "mode": "clone", "validation": { "max_duration_secs": 45.0 } }"#,
        )
        .unwrap();
        assert_eq!(config.language, "tamil");
        assert_eq!(config.mode, EngineMode::Clone);
        assert_eq!(config.validation.max_duration_secs, 45.0);
        assert_eq!(config.validation.min_sample_rate, 16_000);
        assert_eq!(config.models, ModelChoice::default());
        assert_eq!(config.device, None);
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "device": "cuda", "extraction": "page_stream" }"#).unwrap();
        let config = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.device, Some(Device::Cuda));
        assert_eq!(config.extraction, ExtractionMethod::PageStream);
        assert_eq!(config.language, "hindi");
    }

    #[test]
    fn bad_json_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ language: ").unwrap();
        assert!(matches!(
            PipelineConfig::from_json_file(&path).unwrap_err(),
            ConfigError::Json(_)
        ));
        assert!(matches!(
            PipelineConfig::from_json_file(&dir.path().join("missing.json")).unwrap_err(),
            ConfigError::Io(_)
        ));
    }
}
