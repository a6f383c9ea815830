use std::path::{Path, PathBuf};

use super::{load_with_fallback, resolve_output, Device, EngineMode, ModelChoice, ModelLoader, SpeechModel};
use crate::language::language_code;
use crate::{SpeechEngine, SynthesisError};

/// Text-to-speech in the voice of a reference recording.
///
/// Loads its model the same way as [`super::MultilingualEngine`]. A reference
/// clip can be bound at construction and overridden per call; a call with
/// neither fails with [`SynthesisError::MissingVoiceSample`] before the model
/// is touched.
pub struct VoiceCloneEngine {
    model: Box<dyn SpeechModel>,
    language: &'static str,
    device: Device,
    voice_sample: Option<PathBuf>,
}

impl VoiceCloneEngine {
    pub fn new(
        language: &str,
        voice_sample: Option<PathBuf>,
        loader: &dyn ModelLoader,
        models: &ModelChoice,
        device: Option<Device>,
    ) -> Result<Self, SynthesisError> {
        let device = device.unwrap_or_else(|| loader.detect_device());
        let language = language_code(language);
        log::info!("Loading voice cloning model for language: {language}");
        let model = load_with_fallback(loader, models, device)?;
        log::info!("TTS model {} loaded successfully on {device}", model.model_id());
        Ok(Self {
            model,
            language,
            device,
            voice_sample,
        })
    }

    pub fn language(&self) -> &'static str {
        self.language
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Reference clip bound at construction, if any.
    pub fn voice_sample(&self) -> Option<&Path> {
        self.voice_sample.as_deref()
    }

    /// Synthesize with `reference`, or the construction-time clip when `None`.
    pub fn clone_voice(
        &mut self,
        text: &str,
        reference: Option<&Path>,
        output: Option<&Path>,
    ) -> Result<PathBuf, SynthesisError> {
        let reference = reference
            .or(self.voice_sample.as_deref())
            .ok_or(SynthesisError::MissingVoiceSample)?
            .to_path_buf();

        let output = resolve_output(output, EngineMode::Clone.audio_extension())?;
        if let Err(e) = self
            .model
            .synthesize_to_file(text, self.language, Some(&reference), output.path())
        {
            log::error!("Error in voice cloning: {e}");
            return Err(e);
        }
        let output = output.keep()?;
        log::info!("Voice cloned speech saved to: {}", output.display());
        Ok(output)
    }
}

impl SpeechEngine for VoiceCloneEngine {
    fn mode(&self) -> EngineMode {
        EngineMode::Clone
    }

    fn speak(&mut self, text: &str, output: Option<&Path>) -> Result<PathBuf, SynthesisError> {
        self.clone_voice(text, None, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::testing::FakeLoader;

    #[test]
    fn missing_reference_fails_before_any_model_call() {
        let loader = FakeLoader::new();
        let mut engine =
            VoiceCloneEngine::new("kannada", None, &loader, &ModelChoice::default(), None).unwrap();

        let err = engine.speak("text", None).unwrap_err();
        assert!(matches!(err, SynthesisError::MissingVoiceSample));
        assert!(loader.calls().is_empty());
    }

    #[test]
    fn construction_reference_is_passed_to_the_model() {
        let loader = FakeLoader::new();
        let dir = tempfile::tempdir().unwrap();
        let reference = dir.path().join("me.wav");
        let mut engine = VoiceCloneEngine::new(
            "marathi",
            Some(reference.clone()),
            &loader,
            &ModelChoice::default(),
            None,
        )
        .unwrap();

        let out = engine.speak("text", Some(&dir.path().join("out.wav"))).unwrap();
        assert!(out.exists());
        let call = &loader.calls()[0];
        assert_eq!(call.speaker_wav.as_deref(), Some(reference.as_path()));
        assert_eq!(call.language, "mr");
    }

    #[test]
    fn per_call_reference_overrides_the_default() {
        let loader = FakeLoader::new();
        let dir = tempfile::tempdir().unwrap();
        let mut engine = VoiceCloneEngine::new(
            "punjabi",
            Some(dir.path().join("default.wav")),
            &loader,
            &ModelChoice::default(),
            None,
        )
        .unwrap();

        let other = dir.path().join("other.wav");
        let out = engine
            .clone_voice("text", Some(&other), Some(&dir.path().join("out.wav")))
            .unwrap();
        assert_eq!(out, dir.path().join("out.wav"));
        assert_eq!(loader.calls()[0].speaker_wav.as_deref(), Some(other.as_path()));
    }

    #[test]
    fn generated_output_is_a_wav_file() {
        let loader = FakeLoader::new();
        let dir = tempfile::tempdir().unwrap();
        let mut engine = VoiceCloneEngine::new(
            "gujarati",
            Some(dir.path().join("me.wav")),
            &loader,
            &ModelChoice::default(),
            None,
        )
        .unwrap();
        let out = engine.speak("text", None).unwrap();
        assert_eq!(out.extension().unwrap(), "wav");
        std::fs::remove_file(out).unwrap();
    }

    #[test]
    fn failed_cloning_leaves_no_temporary_file() {
        let loader = FakeLoader {
            synthesis_error: Some("speaker encoder failed".to_string()),
            ..FakeLoader::new()
        };
        let dir = tempfile::tempdir().unwrap();
        let mut engine = VoiceCloneEngine::new(
            "odia",
            Some(dir.path().join("me.wav")),
            &loader,
            &ModelChoice::default(),
            None,
        )
        .unwrap();

        assert!(engine.speak("text", None).is_err());
        assert!(!loader.calls()[0].output.exists());
    }
}
