use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Code used when a language name is not recognised.
pub const DEFAULT_LANGUAGE_CODE: &str = "hi";

/// Languages understood by every synthesis backend.
///
/// | Language | Code |
/// |---|---|
/// | English | `en` |
/// | Hindi | `hi` |
/// | Telugu | `te` |
/// | Tamil | `ta` |
/// | Kannada | `kn` |
/// | Bengali | `bn` |
/// | Marathi | `mr` |
/// | Gujarati | `gu` |
/// | Urdu | `ur` |
/// | Punjabi | `pa` |
/// | Malayalam | `ml` |
/// | Odia | `or` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    #[default]
    Hindi,
    Telugu,
    Tamil,
    Kannada,
    Bengali,
    Marathi,
    Gujarati,
    Urdu,
    Punjabi,
    Malayalam,
    Odia,
}

impl Language {
    pub const ALL: [Language; 12] = [
        Language::English,
        Language::Hindi,
        Language::Telugu,
        Language::Tamil,
        Language::Kannada,
        Language::Bengali,
        Language::Marathi,
        Language::Gujarati,
        Language::Urdu,
        Language::Punjabi,
        Language::Malayalam,
        Language::Odia,
    ];

    /// Two-letter code passed to synthesis backends.
    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Hindi => "hi",
            Language::Telugu => "te",
            Language::Tamil => "ta",
            Language::Kannada => "kn",
            Language::Bengali => "bn",
            Language::Marathi => "mr",
            Language::Gujarati => "gu",
            Language::Urdu => "ur",
            Language::Punjabi => "pa",
            Language::Malayalam => "ml",
            Language::Odia => "or",
        }
    }

    /// Lowercase name, as accepted by [`Language::from_name`].
    pub fn name(self) -> &'static str {
        match self {
            Language::English => "english",
            Language::Hindi => "hindi",
            Language::Telugu => "telugu",
            Language::Tamil => "tamil",
            Language::Kannada => "kannada",
            Language::Bengali => "bengali",
            Language::Marathi => "marathi",
            Language::Gujarati => "gujarati",
            Language::Urdu => "urdu",
            Language::Punjabi => "punjabi",
            Language::Malayalam => "malayalam",
            Language::Odia => "odia",
        }
    }

    /// Look up a language by name, ignoring case and surrounding whitespace.
    pub fn from_name(name: &str) -> Option<Language> {
        let wanted = name.trim().to_lowercase();
        Language::ALL.into_iter().find(|lang| lang.name() == wanted)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown language '{0}'")]
pub struct UnknownLanguage(pub String);

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::from_name(s).ok_or_else(|| UnknownLanguage(s.to_string()))
    }
}

/// Resolve a language name to its backend code.
///
/// Names outside the supported set resolve to [`DEFAULT_LANGUAGE_CODE`]
/// instead of failing, so synthesis proceeds in Hindi.
pub fn language_code(name: &str) -> &'static str {
    match Language::from_name(name) {
        Some(lang) => lang.code(),
        None => {
            log::warn!(
                "Unknown language '{name}', falling back to '{DEFAULT_LANGUAGE_CODE}'"
            );
            DEFAULT_LANGUAGE_CODE
        }
    }
}
