//! # pdf-voice
//!
//! A Rust library that reads PDF documents aloud in English and eleven Indian
//! languages, optionally in a voice cloned from a short reference recording.
//!
//! ## Features
//!
//! - **Text extraction**: layout-aware extraction with `pdftotext`, falling
//!   back to pure-Rust page-stream extraction
//! - **Voice sample gating**: duration, sample-rate and silence checks before
//!   expensive voice-cloning synthesis
//! - **Interchangeable engines**: plain multilingual, cloud, and voice-cloning
//!   backends behind one [`SpeechEngine`] trait
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! pdf-voice = { version = "2026.10", features = ["cloud"] }
//! ```
//!
//! ```ignore
//! use std::path::Path;
//! use pdf_voice::{engines::coqui::CoquiLoader, EngineMode, Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig {
//!     language: "telugu".to_string(),
//!     ..Default::default()
//! };
//! let mut pipeline = Pipeline::new(config, Box::new(CoquiLoader::new()));
//!
//! let audio = pipeline.convert(Path::new("book.pdf"), EngineMode::Plain, None, None)?;
//! println!("Wrote {} bytes to {}", audio.bytes, audio.path.display());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod engines;
pub mod error;
pub mod extract;
pub mod language;
pub mod pipeline;
pub mod request;
pub mod synthesize;
pub mod validate;

pub use config::{ConfigError, PipelineConfig};
pub use engines::{Device, EngineMode, ModelChoice, ModelLoader, SpeechModel};
pub use error::{PipelineError, SynthesisError};
pub use extract::{extract_text, page_count, ExtractionMethod, TextExtractor};
pub use language::{language_code, Language, DEFAULT_LANGUAGE_CODE};
pub use pipeline::{Pipeline, Stage};
pub use request::{SynthesisRequest, SynthesisRequestBuilder};
pub use synthesize::Synthesizer;
pub use validate::{validate_voice_sample, AudioValidator, Rejection, ValidationThresholds, VoiceSample};

use std::path::{Path, PathBuf};

/// Raw audio produced by an in-process model.
///
/// Contains f32 samples and the sample rate of the output audio.
#[derive(Debug)]
pub struct SynthesisResult {
    /// Raw audio samples as f32 values
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl SynthesisResult {
    /// Write the audio to a 32-bit float WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<(), hound::Error> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for &sample in &self.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        Ok(())
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// A finished audio file. The caller owns it from here on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioArtifact {
    pub path: PathBuf,
    /// Size of the file in bytes
    pub bytes: u64,
}

impl AudioArtifact {
    /// Describe an audio file that already exists on disk.
    pub fn from_path(path: PathBuf) -> std::io::Result<Self> {
        let bytes = std::fs::metadata(&path)?.len();
        Ok(Self { path, bytes })
    }
}

/// Common interface for speech engines.
///
/// Every backend turns text into an audio file. Engines hold their loaded
/// model and device choice, so one instance can serve many sequential calls;
/// `speak` takes `&mut self` and is never called concurrently on one engine.
pub trait SpeechEngine {
    /// The mode this engine implements.
    fn mode(&self) -> EngineMode;

    /// Synthesize `text` and return the path of the written audio file.
    ///
    /// When `output` is `None` a uniquely named temporary file with the
    /// engine's audio extension is created. A given path is used as-is and
    /// its parent directory must already exist.
    fn speak(&mut self, text: &str, output: Option<&Path>) -> Result<PathBuf, SynthesisError>;
}
