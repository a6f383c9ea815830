//! Cloud text-to-speech through the Google Translate speech endpoint.
//!
//! Stateless per call: the text is split into short chunks, each chunk is
//! fetched as MP3 and the bytes are appended to the output file. MP3 frames
//! concatenate cleanly, so the result plays as one stream.
//!
//! The HTTP client is only compiled with the `cloud` feature. Without it,
//! [`CloudEngine::new`] fails with a configuration error.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::EngineMode;
#[cfg(feature = "cloud")]
use crate::language::language_code;
use crate::{SpeechEngine, SynthesisError};

/// Default speech endpoint.
pub const TRANSLATE_TTS_URL: &str = "https://translate.google.com/translate_tts";

/// Longest text the endpoint accepts per request.
pub const MAX_CHUNK_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    pub endpoint: String,
    pub max_chunk_chars: usize,
    pub timeout_secs: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            endpoint: TRANSLATE_TTS_URL.to_string(),
            max_chunk_chars: MAX_CHUNK_CHARS,
            timeout_secs: 30,
        }
    }
}

/// Cloud text-to-speech engine, writes MP3.
pub struct CloudEngine {
    language: &'static str,
    config: CloudConfig,
    #[cfg(feature = "cloud")]
    client: reqwest::blocking::Client,
}

impl CloudEngine {
    /// Create an engine for `language`. Unknown names synthesize in Hindi.
    #[cfg(feature = "cloud")]
    pub fn new(language: &str, config: CloudConfig) -> Result<Self, SynthesisError> {
        if config.max_chunk_chars == 0 {
            return Err(SynthesisError::Configuration(
                "cloud max_chunk_chars must be at least 1".to_string(),
            ));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            language: language_code(language),
            config,
            client,
        })
    }

    /// Create an engine for `language`.
    ///
    /// Always fails: this build has no HTTP client.
    #[cfg(not(feature = "cloud"))]
    pub fn new(_language: &str, _config: CloudConfig) -> Result<Self, SynthesisError> {
        Err(not_compiled_in())
    }

    pub fn language(&self) -> &'static str {
        self.language
    }

    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    #[cfg(feature = "cloud")]
    fn request(&self, chunk: &str, idx: usize, total: usize) -> reqwest::blocking::RequestBuilder {
        let params = [
            ("ie", "UTF-8".to_string()),
            ("q", chunk.to_string()),
            ("tl", self.language.to_string()),
            ("client", "tw-ob".to_string()),
            ("total", total.to_string()),
            ("idx", idx.to_string()),
            ("textlen", chunk.chars().count().to_string()),
        ];
        self.client.get(&self.config.endpoint).query(&params)
    }

    /// Fetch every chunk into `output`. A partly written file is removed on failure.
    #[cfg(feature = "cloud")]
    fn fetch_to_file(&self, text: &str, output: &Path) -> Result<(), SynthesisError> {
        let chunks = split_text(text, self.config.max_chunk_chars);
        if chunks.is_empty() {
            return Err(SynthesisError::Backend("no text to speak".to_string()));
        }

        let mut file = std::fs::File::create(output)?;
        let result = self.write_chunks(&mut file, &chunks);
        if result.is_err() {
            drop(file);
            if let Err(e) = std::fs::remove_file(output) {
                log::warn!("Could not remove partial audio {}: {e}", output.display());
            }
        }
        result
    }

    #[cfg(feature = "cloud")]
    fn write_chunks(&self, file: &mut std::fs::File, chunks: &[String]) -> Result<(), SynthesisError> {
        use std::io::Write;

        for (idx, chunk) in chunks.iter().enumerate() {
            log::debug!("Requesting chunk {}/{}", idx + 1, chunks.len());
            let audio = self
                .request(chunk, idx, chunks.len())
                .send()?
                .error_for_status()?
                .bytes()?;
            file.write_all(&audio)?;
        }
        file.flush()?;
        Ok(())
    }

    #[cfg(not(feature = "cloud"))]
    fn fetch_to_file(&self, _text: &str, _output: &Path) -> Result<(), SynthesisError> {
        Err(not_compiled_in())
    }
}

#[cfg(not(feature = "cloud"))]
fn not_compiled_in() -> SynthesisError {
    SynthesisError::Configuration(
        "cloud TTS support is not compiled in. Rebuild with the `cloud` feature.".to_string(),
    )
}

impl SpeechEngine for CloudEngine {
    fn mode(&self) -> EngineMode {
        EngineMode::Cloud
    }

    fn speak(&mut self, text: &str, output: Option<&Path>) -> Result<PathBuf, SynthesisError> {
        let output = super::resolve_output(output, EngineMode::Cloud.audio_extension())?;
        self.fetch_to_file(text, output.path())?;
        let output = output.keep()?;
        log::info!("Cloud TTS audio saved to: {}", output.display());
        Ok(output)
    }
}

fn ends_sentence(word: &str) -> bool {
    word.ends_with(&['.', '!', '?', '\u{964}', '\u{965}'][..])
}

/// Split `text` into request-sized chunks of at most `max_chars` characters.
///
/// Chunks break after sentence-ending punctuation (including the Devanagari
/// danda) and otherwise between words. Words longer than `max_chars` are cut.
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() { word_len } else { current_len + 1 + word_len };
        if needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;

        if ends_sentence(word) {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
