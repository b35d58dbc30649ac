//! Output languages supported by XTTS.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Unsupported language: {0}")]
pub struct UnsupportedLanguage(pub String);

/// Target language for synthesized speech.
///
/// Serialized as the code the model expects (`en`, `zh-cn`, ...).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Language {
    #[default]
    English,
    Spanish,
    French,
    German,
    Italian,
    Portuguese,
    Polish,
    Turkish,
    Russian,
    Dutch,
    Czech,
    Arabic,
    Chinese,
}

impl Language {
    /// Every language, in dropdown order.
    pub const ALL: [Language; 13] = [
        Language::English,
        Language::Spanish,
        Language::French,
        Language::German,
        Language::Italian,
        Language::Portuguese,
        Language::Polish,
        Language::Turkish,
        Language::Russian,
        Language::Dutch,
        Language::Czech,
        Language::Arabic,
        Language::Chinese,
    ];

    /// Returns the language code sent to the model.
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Spanish => "es",
            Language::French => "fr",
            Language::German => "de",
            Language::Italian => "it",
            Language::Portuguese => "pt",
            Language::Polish => "pl",
            Language::Turkish => "tr",
            Language::Russian => "ru",
            Language::Dutch => "nl",
            // XTTS uses "cz" rather than ISO "cs"
            Language::Czech => "cz",
            Language::Arabic => "ar",
            Language::Chinese => "zh-cn",
        }
    }

    /// Returns the human-readable name of the language.
    pub fn name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Spanish => "Spanish",
            Language::French => "French",
            Language::German => "German",
            Language::Italian => "Italian",
            Language::Portuguese => "Portuguese",
            Language::Polish => "Polish",
            Language::Turkish => "Turkish",
            Language::Russian => "Russian",
            Language::Dutch => "Dutch",
            Language::Czech => "Czech",
            Language::Arabic => "Arabic",
            Language::Chinese => "Chinese (Simplified)",
        }
    }
}

impl FromStr for Language {
    type Err = UnsupportedLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_lowercase();
        Language::ALL
            .into_iter()
            .find(|lang| lang.code() == code)
            .ok_or_else(|| UnsupportedLanguage(s.to_string()))
    }
}

impl TryFrom<String> for Language {
    type Error = UnsupportedLanguage;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Language> for String {
    fn from(lang: Language) -> Self {
        lang.code().to_string()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
