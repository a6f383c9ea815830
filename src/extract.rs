//! PDF text extraction.
//!
//! Two strategies produce the same shape of output: every page's text
//! followed by a newline, with the whole result trimmed.
//!
//! - **Layout**: `pdftotext -layout` (poppler-utils), which keeps columns and
//!   reading order. Pages are separated by form feeds in its output.
//! - **Page stream**: `lopdf` decodes the text operators of each page's
//!   content stream. Pure Rust, always available, but ignores layout.
//!
//! Extraction never fails at this boundary. Encrypted, scanned, corrupt, or
//! empty documents produce an empty string and the cause is logged; callers
//! treat an empty string as "no usable text".

use std::path::Path;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};

const PDFTOTEXT: &str = "pdftotext";
const FORM_FEED: char = '\u{c}';

/// Which extraction strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Layout first, page stream when the layout tool is missing or fails.
    #[default]
    Auto,
    Layout,
    PageStream,
}

#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    #[error("pdftotext not found. Install poppler-utils to enable layout extraction.")]
    PdftotextNotFound,
    #[error("pdftotext failed: {0}")]
    PdftotextFailed(String),
    #[error("document is encrypted")]
    Encrypted,
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pulls plain text out of PDF documents.
#[derive(Debug, Clone, Default)]
pub struct TextExtractor {
    method: ExtractionMethod,
}

impl TextExtractor {
    pub fn new(method: ExtractionMethod) -> Self {
        Self { method }
    }

    pub fn method(&self) -> ExtractionMethod {
        self.method
    }

    /// Extract all text from the document, or `""` if nothing usable is found.
    pub fn extract(&self, path: &Path) -> String {
        let result = match self.method {
            ExtractionMethod::Layout => extract_layout(path),
            ExtractionMethod::PageStream => extract_page_stream(path),
            ExtractionMethod::Auto => extract_layout(path).or_else(|e| {
                log::warn!(
                    "Layout extraction failed for {}, falling back to page stream: {e}",
                    path.display()
                );
                extract_page_stream(path)
            }),
        };

        match result {
            Ok(text) => {
                log::info!("Extracted {} characters from PDF", text.chars().count());
                text
            }
            Err(e) => {
                log::error!("Error extracting text from {}: {e}", path.display());
                String::new()
            }
        }
    }
}

/// Extract text with the default strategy.
pub fn extract_text(path: &Path) -> String {
    TextExtractor::default().extract(path)
}

/// Number of pages in the document, 0 if it cannot be read.
pub fn page_count(path: &Path) -> usize {
    match lopdf::Document::load(path) {
        Ok(doc) => doc.get_pages().len(),
        Err(e) => {
            log::error!("Error getting page count for {}: {e}", path.display());
            0
        }
    }
}

fn join_pages<I, S>(pages: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut text = String::new();
    for page in pages {
        let page = page.as_ref();
        if page.trim().is_empty() {
            continue;
        }
        text.push_str(page);
        text.push('\n');
    }
    text.trim().to_string()
}

fn extract_layout(path: &Path) -> Result<String, ExtractError> {
    let output = Command::new(PDFTOTEXT)
        .args(["-layout", "-enc", "UTF-8"])
        .arg(path)
        .arg("-")
        .stdin(Stdio::null())
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ExtractError::PdftotextNotFound
            } else {
                ExtractError::Io(e)
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ExtractError::PdftotextFailed(format!(
            "exited with code {:?}: {}",
            output.status.code(),
            stderr.trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    // pdftotext terminates every page with a form feed.
    let pages = stdout
        .strip_suffix(FORM_FEED)
        .unwrap_or(&stdout)
        .split(FORM_FEED);
    Ok(join_pages(pages))
}

fn extract_page_stream(path: &Path) -> Result<String, ExtractError> {
    let doc = lopdf::Document::load(path)?;
    if doc.is_encrypted() {
        return Err(ExtractError::Encrypted);
    }

    let mut pages = Vec::new();
    for page_number in doc.get_pages().keys() {
        match doc.extract_text(&[*page_number]) {
            Ok(text) => pages.push(text),
            Err(e) => {
                // One undecodable page should not drop the rest of the document.
                log::debug!("Skipping page {page_number}: {e}");
            }
        }
    }
    Ok(join_pages(pages))
}
