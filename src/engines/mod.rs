//! Speech synthesis engines and the model backends they drive.
//!
//! # Engines
//!
//! One [`SpeechEngine`] implementation per [`EngineMode`]:
//! - [`multilingual::MultilingualEngine`] - plain multilingual synthesis
//! - [`cloud::CloudEngine`] - cloud text-to-speech (`cloud` feature)
//! - [`clone::VoiceCloneEngine`] - synthesis in the voice of a reference clip
//!
//! # Model Backends
//!
//! The model engines load a pre-trained model through a [`ModelLoader`]:
//! - [`coqui::CoquiLoader`] - Coqui TTS in a long-running Python worker (XTTS family)
//! - `onnx::OnnxLoader` - in-process VITS model via ONNX Runtime (`onnx` feature)

pub mod clone;
pub mod cloud;
pub mod coqui;
pub mod multilingual;
#[cfg(feature = "onnx")]
pub mod onnx;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{SpeechEngine, SynthesisError};

pub use self::clone::VoiceCloneEngine;
pub use self::cloud::{CloudConfig, CloudEngine};
pub use self::multilingual::MultilingualEngine;

/// Which engine variant to synthesize with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineMode {
    #[default]
    Plain,
    Cloud,
    Clone,
}

impl EngineMode {
    /// True when synthesis needs a reference voice sample.
    pub fn requires_voice_sample(self) -> bool {
        matches!(self, EngineMode::Clone)
    }

    /// File extension of the audio this mode produces.
    pub fn audio_extension(self) -> &'static str {
        match self {
            EngineMode::Cloud => "mp3",
            EngineMode::Plain | EngineMode::Clone => "wav",
        }
    }
}

impl fmt::Display for EngineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EngineMode::Plain => "plain",
            EngineMode::Cloud => "cloud",
            EngineMode::Clone => "clone",
        })
    }
}

/// Where model inference runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Cpu,
    Cuda,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
        })
    }
}

/// Model identifiers tried at engine construction: `primary`, then `fallback`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelChoice {
    pub primary: String,
    pub fallback: String,
}

impl Default for ModelChoice {
    fn default() -> Self {
        Self {
            primary: coqui::PRIMARY_MODEL.to_string(),
            fallback: coqui::FALLBACK_MODEL.to_string(),
        }
    }
}

/// A loaded pre-trained speech model.
///
/// The model is a black box: it receives text, a two-letter language code,
/// an optional speaker reference clip and the output path, and writes audio.
pub trait SpeechModel {
    /// Identifier the model was loaded with.
    fn model_id(&self) -> &str;

    fn synthesize_to_file(
        &mut self,
        text: &str,
        language: &str,
        speaker_wav: Option<&Path>,
        output: &Path,
    ) -> Result<(), SynthesisError>;
}

/// Loads [`SpeechModel`]s by identifier.
pub trait ModelLoader {
    /// Best device available on this machine.
    fn detect_device(&self) -> Device;

    /// Load the model named `model_id` onto `device`.
    fn load(&self, model_id: &str, device: Device) -> Result<Box<dyn SpeechModel>, SynthesisError>;
}

/// Load `choice.primary`, retrying once with `choice.fallback` on failure.
pub fn load_with_fallback(
    loader: &dyn ModelLoader,
    choice: &ModelChoice,
    device: Device,
) -> Result<Box<dyn SpeechModel>, SynthesisError> {
    log::info!("Attempting to load: {} on {device}", choice.primary);
    match loader.load(&choice.primary, device) {
        Ok(model) => Ok(model),
        Err(e) => {
            log::warn!(
                "Model {} failed, falling back to {}: {e}",
                choice.primary,
                choice.fallback
            );
            loader.load(&choice.fallback, device)
        }
    }
}

/// Where an engine writes its audio.
///
/// A temporary file is deleted on drop unless [`OutputFile::keep`] is called,
/// so a failed synthesis leaves nothing behind.
#[derive(Debug)]
pub enum OutputFile {
    Given(PathBuf),
    Temporary(tempfile::TempPath),
}

impl OutputFile {
    pub fn path(&self) -> &Path {
        match self {
            OutputFile::Given(path) => path.as_path(),
            OutputFile::Temporary(path) => &**path,
        }
    }

    /// Hand the finished file over to the caller.
    pub fn keep(self) -> Result<PathBuf, SynthesisError> {
        match self {
            OutputFile::Given(path) => Ok(path),
            OutputFile::Temporary(path) => path.keep().map_err(|e| SynthesisError::Io(e.error)),
        }
    }
}

/// Resolve where audio should be written.
///
/// `None` creates a uniquely named temporary file ending in `.{extension}`.
/// A caller-supplied path is used untouched and its parent is not created.
pub fn resolve_output(output: Option<&Path>, extension: &str) -> Result<OutputFile, SynthesisError> {
    match output {
        Some(path) => Ok(OutputFile::Given(path.to_path_buf())),
        None => {
            let suffix = format!(".{extension}");
            let file = tempfile::Builder::new()
                .prefix("pdf-voice-")
                .suffix(&suffix)
                .tempfile()?;
            Ok(OutputFile::Temporary(file.into_temp_path()))
        }
    }
}

/// Build the engine for `mode`.
///
/// Model engines load their model here, so this is the expensive step.
/// `device` pins the execution device; `None` detects it once.
pub fn build_engine(
    mode: EngineMode,
    language: &str,
    loader: &dyn ModelLoader,
    models: &ModelChoice,
    device: Option<Device>,
    cloud: &CloudConfig,
    voice_sample: Option<&Path>,
) -> Result<Box<dyn SpeechEngine>, SynthesisError> {
    Ok(match mode {
        EngineMode::Plain => Box::new(MultilingualEngine::new(language, loader, models, device)?),
        EngineMode::Cloud => Box::new(CloudEngine::new(language, cloud.clone())?),
        EngineMode::Clone => Box::new(VoiceCloneEngine::new(
            language,
            voice_sample.map(Path::to_path_buf),
            loader,
            models,
            device,
        )?),
    })
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording model backend for engine and pipeline tests.

    use std::f32::consts::PI;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::SynthesisResult;

    /// One call made against a [`FakeModel`].
    #[derive(Debug, Clone, PartialEq)]
    pub struct Call {
        pub model: String,
        pub text: String,
        pub language: String,
        pub speaker_wav: Option<PathBuf>,
        pub output: PathBuf,
    }

    #[derive(Debug, Default)]
    pub struct Log {
        pub loads: Vec<(String, Device)>,
        pub calls: Vec<Call>,
    }

    /// Loader whose models write a short sine tone and record every call.
    #[derive(Clone, Default)]
    pub struct FakeLoader {
        pub log: Arc<Mutex<Log>>,
        /// Model identifiers that fail to load.
        pub broken: Vec<String>,
        pub device: Device,
        /// When set, synthesis fails with this message.
        pub synthesis_error: Option<String>,
    }

    impl FakeLoader {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn loads(&self) -> Vec<(String, Device)> {
            self.log.lock().unwrap().loads.clone()
        }

        pub fn calls(&self) -> Vec<Call> {
            self.log.lock().unwrap().calls.clone()
        }
    }

    impl ModelLoader for FakeLoader {
        fn detect_device(&self) -> Device {
            self.device
        }

        fn load(&self, model_id: &str, device: Device) -> Result<Box<dyn SpeechModel>, SynthesisError> {
            self.log
                .lock()
                .unwrap()
                .loads
                .push((model_id.to_string(), device));
            if self.broken.iter().any(|b| b == model_id) {
                return Err(SynthesisError::ModelLoad {
                    model: model_id.to_string(),
                    reason: "checkpoint missing".to_string(),
                });
            }
            Ok(Box::new(FakeModel {
                id: model_id.to_string(),
                log: Arc::clone(&self.log),
                error: self.synthesis_error.clone(),
            }))
        }
    }

    pub struct FakeModel {
        id: String,
        log: Arc<Mutex<Log>>,
        error: Option<String>,
    }

    impl SpeechModel for FakeModel {
        fn model_id(&self) -> &str {
            &self.id
        }

        fn synthesize_to_file(
            &mut self,
            text: &str,
            language: &str,
            speaker_wav: Option<&Path>,
            output: &Path,
        ) -> Result<(), SynthesisError> {
            self.log.lock().unwrap().calls.push(Call {
                model: self.id.clone(),
                text: text.to_string(),
                language: language.to_string(),
                speaker_wav: speaker_wav.map(Path::to_path_buf),
                output: output.to_path_buf(),
            });
            if let Some(message) = &self.error {
                return Err(SynthesisError::Backend(message.clone()));
            }
            let sample_rate = 16_000;
            let samples = (0..sample_rate / 2)
                .map(|i| (2.0 * PI * 440.0 * i as f32 / sample_rate as f32).sin() * 0.3)
                .collect();
            SynthesisResult {
                samples,
                sample_rate,
            }
            .write_wav(output)?;
            Ok(())
        }
    }
}
