//! PDF-to-speech orchestration.
//!
//! A conversion moves through these stages, stopping at the first failure:
//!
//! ```text
//! Idle -> Extracting -> Extracted -> [Validating -> Validated] -> Synthesizing -> Done
//!              \-> ExtractFailed        \-> ValidationFailed          \-> SynthesisFailed
//! ```
//!
//! Validation only runs in clone mode. Nothing is retried; callers rerun the
//! whole conversion.

use std::path::Path;

use crate::config::PipelineConfig;
use crate::engines::{EngineMode, ModelLoader};
use crate::extract::TextExtractor;
use crate::synthesize::Synthesizer;
use crate::validate::AudioValidator;
use crate::{AudioArtifact, PipelineError, SynthesisError, SynthesisRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Extracting,
    Extracted,
    ExtractFailed,
    Validating,
    Validated,
    ValidationFailed,
    Synthesizing,
    SynthesisFailed,
    Done,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Stage::ExtractFailed | Stage::ValidationFailed | Stage::SynthesisFailed | Stage::Done
        )
    }
}

/// Reads a PDF aloud: extract, validate the voice sample, synthesize.
pub struct Pipeline {
    config: PipelineConfig,
    extractor: TextExtractor,
    validator: AudioValidator,
    synthesizer: Synthesizer,
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, loader: Box<dyn ModelLoader>) -> Self {
        let synthesizer = Synthesizer::new(loader)
            .with_models(config.models.clone())
            .with_device(config.device)
            .with_cloud(config.cloud.clone());
        Self {
            extractor: TextExtractor::new(config.extraction),
            validator: AudioValidator::with_thresholds(config.validation.clone()),
            synthesizer,
            config,
            stages: Vec::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Current stage of the last conversion.
    pub fn stage(&self) -> Stage {
        self.stages.last().copied().unwrap_or(Stage::Idle)
    }

    /// Stages the last conversion went through, in order.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    fn enter(&mut self, stage: Stage) {
        log::debug!("Pipeline stage: {stage:?}");
        self.stages.push(stage);
    }

    /// Convert with the mode from the config.
    pub fn convert_default(
        &mut self,
        pdf: &Path,
        voice_sample: Option<&Path>,
        output: Option<&Path>,
    ) -> Result<AudioArtifact, PipelineError> {
        self.convert(pdf, self.config.mode, voice_sample, output)
    }

    /// Turn `pdf` into an audio file.
    ///
    /// `voice_sample` is required in clone mode and ignored otherwise.
    /// `output` is used as-is; without it a temporary file is created.
    pub fn convert(
        &mut self,
        pdf: &Path,
        mode: EngineMode,
        voice_sample: Option<&Path>,
        output: Option<&Path>,
    ) -> Result<AudioArtifact, PipelineError> {
        self.stages.clear();
        if mode.requires_voice_sample() && voice_sample.is_none() {
            return Err(SynthesisError::MissingVoiceSample.into());
        }

        log::info!("Reading PDF: {}", pdf.display());
        self.enter(Stage::Extracting);
        let text = self.extractor.extract(pdf);
        if text.is_empty() {
            self.enter(Stage::ExtractFailed);
            return Err(PipelineError::NoUsableText(pdf.to_path_buf()));
        }
        self.enter(Stage::Extracted);

        if mode.requires_voice_sample() {
            if let Some(sample) = voice_sample {
                self.enter(Stage::Validating);
                let (is_valid, message) = self.validator.validate(sample);
                if !is_valid {
                    self.enter(Stage::ValidationFailed);
                    return Err(PipelineError::VoiceRejected(message));
                }
                self.enter(Stage::Validated);
            }
        }

        let mut builder = SynthesisRequest::builder();
        builder
            .text(text)
            .language(self.config.language.clone())
            .mode(mode);
        if let Some(sample) = voice_sample {
            builder.voice_sample(sample);
        }
        if let Some(output) = output {
            builder.output_path(output);
        }
        let request = builder.build()?;

        log::info!(
            "Converting {} characters to speech in {} ({mode} mode)",
            request.text.chars().count(),
            request.language
        );
        self.enter(Stage::Synthesizing);
        match self.synthesizer.synthesize(&request) {
            Ok(audio) => {
                self.enter(Stage::Done);
                log::info!(
                    "Audio generated successfully: {} ({} bytes)",
                    audio.path.display(),
                    audio.bytes
                );
                Ok(audio)
            }
            Err(e) => {
                self.enter(Stage::SynthesisFailed);
                log::error!("Synthesis failed: {e}");
                Err(e.into())
            }
        }
    }
}
