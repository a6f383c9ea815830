use std::path::PathBuf;

use crate::request::SynthesisRequestBuilderError;

/// Errors raised by synthesis engines and model backends.
#[derive(thiserror::Error, Debug)]
pub enum SynthesisError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("A reference voice sample is required for voice cloning")]
    MissingVoiceSample,
    #[error("Failed to load model '{model}': {reason}")]
    ModelLoad { model: String, reason: String },
    #[error("'{0}' not found. Install it or point the loader at the binary.")]
    ToolNotFound(String),
    #[error("Synthesis backend failed: {0}")]
    Backend(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[cfg(feature = "onnx")]
    #[error("ONNX runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[cfg(feature = "onnx")]
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[cfg(feature = "cloud")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors that end a PDF-to-speech conversion.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(
        "No usable text extracted from {}. The PDF may be a scanned image; \
         run it through OCR first.",
        .0.display()
    )]
    NoUsableText(PathBuf),
    #[error("Voice sample rejected: {0}")]
    VoiceRejected(String),
    #[error("Invalid synthesis request: {0}")]
    InvalidRequest(#[from] SynthesisRequestBuilderError),
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
}
