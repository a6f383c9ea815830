//! In-process multilingual VITS model running on ONNX Runtime.
//!
//! Text is phonemized with espeak-ng using the two-letter language code,
//! so one model covers every language espeak-ng can phonemize. The model
//! has no speaker encoder and cannot clone voices.
//!
//! # System Requirements
//!
//! **espeak-ng** must be installed on your system:
//! - **Linux**: `sudo apt-get install espeak-ng`
//! - **macOS**: `brew install espeak-ng`
//! - **Windows**: Download installer from <https://espeak-ng.org/download>
//!
//! # Model Directory Layout
//!
//! Models use the Piper layout, one file pair per model identifier:
//!
//! ```text
//! models/
//! ├── indic-vits-medium.onnx        # model graph
//! └── indic-vits-medium.onnx.json   # sample rate, inference scales, phoneme map
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use pdf_voice::engines::{onnx::OnnxLoader, ModelChoice, MultilingualEngine};
//! use pdf_voice::SpeechEngine;
//! use std::path::Path;
//!
//! let loader = OnnxLoader::new("models");
//! let models = ModelChoice {
//!     primary: "indic-vits-high".to_string(),
//!     fallback: "indic-vits-medium".to_string(),
//! };
//! let mut engine = MultilingualEngine::new("tamil", &loader, &models, None)?;
//! engine.speak("வணக்கம்", Some(Path::new("out.wav")))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod model;
pub mod phonemizer;

pub use model::{OnnxModel, VoiceConfig};
pub use phonemizer::EspeakConfig;

use std::path::PathBuf;

use super::{Device, ModelLoader, SpeechModel};
use crate::SynthesisError;

/// Loads ONNX models from a directory.
#[derive(Debug, Clone)]
pub struct OnnxLoader {
    model_dir: PathBuf,
    /// Number of intra-op threads. `None` uses the ORT default.
    pub num_threads: Option<usize>,
    pub espeak: EspeakConfig,
}

impl OnnxLoader {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            num_threads: None,
            espeak: EspeakConfig::default(),
        }
    }

    /// Paths of the graph and config for `model_id`.
    pub fn model_files(&self, model_id: &str) -> (PathBuf, PathBuf) {
        (
            self.model_dir.join(format!("{model_id}.onnx")),
            self.model_dir.join(format!("{model_id}.onnx.json")),
        )
    }
}

impl ModelLoader for OnnxLoader {
    fn detect_device(&self) -> Device {
        if model::cuda_available() {
            Device::Cuda
        } else {
            Device::Cpu
        }
    }

    fn load(&self, model_id: &str, device: Device) -> Result<Box<dyn SpeechModel>, SynthesisError> {
        let (onnx_path, config_path) = self.model_files(model_id);
        for path in [&onnx_path, &config_path] {
            if !path.exists() {
                return Err(SynthesisError::ModelLoad {
                    model: model_id.to_string(),
                    reason: format!("{} not found", path.display()),
                });
            }
        }

        let model = OnnxModel::load(
            model_id,
            &onnx_path,
            &config_path,
            device,
            self.num_threads,
            self.espeak.clone(),
        )
        .map_err(|e| SynthesisError::ModelLoad {
            model: model_id.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Box::new(model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::{load_with_fallback, ModelChoice};

    #[test]
    fn model_files_follow_piper_layout() {
        let loader = OnnxLoader::new("/models");
        let (graph, config) = loader.model_files("indic-vits");
        assert_eq!(graph, PathBuf::from("/models/indic-vits.onnx"));
        assert_eq!(config, PathBuf::from("/models/indic-vits.onnx.json"));
    }

    #[test]
    fn missing_models_fail_to_load_after_one_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let loader = OnnxLoader::new(dir.path());
        let models = ModelChoice {
            primary: "high".to_string(),
            fallback: "medium".to_string(),
        };
        let err = load_with_fallback(&loader, &models, Device::Cpu).err().unwrap();
        assert!(
            matches!(err, SynthesisError::ModelLoad { ref model, .. } if model == "medium"),
            "{err}"
        );
    }
}
