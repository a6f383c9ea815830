use std::path::{Path, PathBuf};

use super::{load_with_fallback, resolve_output, Device, EngineMode, ModelChoice, ModelLoader, SpeechModel};
use crate::language::language_code;
use crate::{SpeechEngine, SynthesisError};

/// Plain multilingual text-to-speech.
///
/// Loads its model once at construction (primary identifier, then the
/// fallback) and synthesizes with the language's two-letter code and no
/// speaker reference.
pub struct MultilingualEngine {
    model: Box<dyn SpeechModel>,
    language: &'static str,
    device: Device,
}

impl MultilingualEngine {
    /// Load the model and bind the engine to `language`.
    ///
    /// Unknown language names synthesize in Hindi.
    pub fn new(
        language: &str,
        loader: &dyn ModelLoader,
        models: &ModelChoice,
        device: Option<Device>,
    ) -> Result<Self, SynthesisError> {
        let device = device.unwrap_or_else(|| loader.detect_device());
        let language = language_code(language);
        log::info!("Loading TTS model for language: {language}");
        let model = load_with_fallback(loader, models, device)?;
        log::info!("TTS model {} loaded successfully on {device}", model.model_id());
        Ok(Self {
            model,
            language,
            device,
        })
    }

    /// Language code passed to the model.
    pub fn language(&self) -> &'static str {
        self.language
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }
}

impl SpeechEngine for MultilingualEngine {
    fn mode(&self) -> EngineMode {
        EngineMode::Plain
    }

    fn speak(&mut self, text: &str, output: Option<&Path>) -> Result<PathBuf, SynthesisError> {
        let output = resolve_output(output, EngineMode::Plain.audio_extension())?;
        self.model
            .synthesize_to_file(text, self.language, None, output.path())?;
        let output = output.keep()?;
        log::info!("Audio saved to: {}", output.display());
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::testing::FakeLoader;

    #[test]
    fn hello_world_in_english_writes_a_wav() {
        let loader = FakeLoader::new();
        let mut engine =
            MultilingualEngine::new("english", &loader, &ModelChoice::default(), None).unwrap();
        let path = engine.speak("Hello world", None).unwrap();

        assert_eq!(path.extension().unwrap(), "wav");
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
        let calls = loader.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].language, "en");
        assert_eq!(calls[0].speaker_wav, None);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn unknown_language_reaches_the_model_as_hindi() {
        let loader = FakeLoader::new();
        let dir = tempfile::tempdir().unwrap();
        let mut engine =
            MultilingualEngine::new("klingon", &loader, &ModelChoice::default(), None).unwrap();
        engine.speak("nuqneH", Some(&dir.path().join("out.wav"))).unwrap();
        assert_eq!(loader.calls()[0].language, "hi");
    }

    #[test]
    fn device_is_chosen_once_at_construction() {
        let loader = FakeLoader {
            device: Device::Cuda,
            ..FakeLoader::new()
        };
        let auto = MultilingualEngine::new("tamil", &loader, &ModelChoice::default(), None).unwrap();
        assert_eq!(auto.device(), Device::Cuda);

        let pinned =
            MultilingualEngine::new("tamil", &loader, &ModelChoice::default(), Some(Device::Cpu))
                .unwrap();
        assert_eq!(pinned.device(), Device::Cpu);
        assert_eq!(loader.loads()[1].1, Device::Cpu);
    }

    #[test]
    fn fallback_model_is_loaded_when_primary_fails() {
        let models = ModelChoice::default();
        let loader = FakeLoader {
            broken: vec![models.primary.clone()],
            ..FakeLoader::new()
        };
        let engine = MultilingualEngine::new("bengali", &loader, &models, None).unwrap();
        assert_eq!(engine.model_id(), models.fallback);
    }

    #[test]
    fn repeated_calls_write_independent_files() {
        let loader = FakeLoader::new();
        let dir = tempfile::tempdir().unwrap();
        let mut engine =
            MultilingualEngine::new("hindi", &loader, &ModelChoice::default(), None).unwrap();
        let first = engine.speak("namaste", Some(&dir.path().join("a.wav"))).unwrap();
        let second = engine.speak("namaste", Some(&dir.path().join("b.wav"))).unwrap();

        assert_ne!(first, second);
        for path in [&first, &second] {
            let reader = hound::WavReader::open(path).unwrap();
            assert!(reader.duration() > 0);
        }
        std::fs::remove_file(&first).unwrap();
        assert!(second.exists());
    }

    #[test]
    fn backend_failure_is_propagated() {
        let loader = FakeLoader {
            synthesis_error: Some("CUDA out of memory".to_string()),
            ..FakeLoader::new()
        };
        let dir = tempfile::tempdir().unwrap();
        let mut engine =
            MultilingualEngine::new("urdu", &loader, &ModelChoice::default(), None).unwrap();
        let err = engine
            .speak("text", Some(&dir.path().join("out.wav")))
            .unwrap_err();
        assert!(err.to_string().contains("CUDA out of memory"));
    }

    #[test]
    fn failed_synthesis_leaves_no_temporary_file() {
        let loader = FakeLoader {
            synthesis_error: Some("model crashed".to_string()),
            ..FakeLoader::new()
        };
        let mut engine =
            MultilingualEngine::new("english", &loader, &ModelChoice::default(), None).unwrap();
        assert!(engine.speak("Hello", None).is_err());

        let attempted = &loader.calls()[0].output;
        assert!(attempted.starts_with(std::env::temp_dir()));
        assert!(!attempted.exists());
    }
}
