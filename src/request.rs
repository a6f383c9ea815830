use std::path::PathBuf;

use derive_builder::Builder;

use crate::engines::EngineMode;
use crate::language::Language;

/// Everything needed for one synthesis call.
///
/// Built with [`SynthesisRequestBuilder`], which refuses clone-mode requests
/// without a voice sample and requests with blank text.
///
/// ```
/// use pdf_voice::{EngineMode, SynthesisRequest};
///
/// let request = SynthesisRequest::builder()
///     .text("Hello world")
///     .language("english")
///     .mode(EngineMode::Plain)
///     .build()?;
/// assert_eq!(request.voice_sample, None);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct SynthesisRequest {
    pub text: String,
    /// Language name, e.g. `"telugu"`. Unknown names synthesize in Hindi.
    #[builder(default = "Language::default().name().to_string()")]
    pub language: String,
    #[builder(default)]
    pub mode: EngineMode,
    #[builder(default, setter(strip_option))]
    pub voice_sample: Option<PathBuf>,
    /// Where to write audio; a temporary file is created when unset.
    #[builder(default, setter(strip_option))]
    pub output_path: Option<PathBuf>,
}

impl SynthesisRequest {
    pub fn builder() -> SynthesisRequestBuilder {
        SynthesisRequestBuilder::default()
    }
}

impl SynthesisRequestBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(text) = &self.text {
            if text.trim().is_empty() {
                return Err("text is empty".to_string());
            }
        }
        let mode = self.mode.unwrap_or_default();
        let has_sample = matches!(self.voice_sample, Some(Some(_)));
        if mode.requires_voice_sample() && !has_sample {
            return Err(format!("{mode} mode requires a reference voice sample"));
        }
        Ok(())
    }
}
