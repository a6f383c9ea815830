use crate::engines::{build_engine, CloudConfig, Device, ModelChoice, ModelLoader};
use crate::{AudioArtifact, SpeechEngine, SynthesisError, SynthesisRequest};

/// One-shot synthesis: builds the engine a request asks for and runs it.
///
/// Nothing is shared between calls except the loader and settings, so two
/// requests never see each other's text, voice sample, or output file.
pub struct Synthesizer {
    loader: Box<dyn ModelLoader>,
    models: ModelChoice,
    device: Option<Device>,
    cloud: CloudConfig,
}

impl Synthesizer {
    pub fn new(loader: Box<dyn ModelLoader>) -> Self {
        Self {
            loader,
            models: ModelChoice::default(),
            device: None,
            cloud: CloudConfig::default(),
        }
    }

    pub fn with_models(mut self, models: ModelChoice) -> Self {
        self.models = models;
        self
    }

    /// Pin the execution device instead of detecting it.
    pub fn with_device(mut self, device: Option<Device>) -> Self {
        self.device = device;
        self
    }

    pub fn with_cloud(mut self, cloud: CloudConfig) -> Self {
        self.cloud = cloud;
        self
    }

    /// Build the engine for a request without running it.
    pub fn engine(&self, request: &SynthesisRequest) -> Result<Box<dyn SpeechEngine>, SynthesisError> {
        if request.mode.requires_voice_sample() && request.voice_sample.is_none() {
            return Err(SynthesisError::MissingVoiceSample);
        }
        build_engine(
            request.mode,
            &request.language,
            self.loader.as_ref(),
            &self.models,
            self.device,
            &self.cloud,
            request.voice_sample.as_deref(),
        )
    }

    /// Synthesize the request's text and describe the written file.
    pub fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioArtifact, SynthesisError> {
        let mut engine = self.engine(request)?;
        let path = engine.speak(&request.text, request.output_path.as_deref())?;
        Ok(AudioArtifact::from_path(path)?)
    }
}
