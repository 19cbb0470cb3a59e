//! Text analysis shared by document ingest and query execution.
//!
//! A document and a query must pass through the identical pipeline or the
//! dictionary lookups silently miss, so there is exactly one entry point:
//! [`Analyzer::analyze`]. The pipeline order is fixed: lowercase, accent
//! stripping, ignore-pattern blanking, whitespace split, stop word removal,
//! stemming.

use ahash::AHashSet;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::error::{EngineError, Result};
use crate::stopwords;

/// Snowball stemmer selection. `Porter` is the classic English stemmer and
/// the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StemmerKind {
    None,
    Porter,
    Arabic,
    Danish,
    Dutch,
    English,
    Finnish,
    French,
    German,
    Greek,
    Hungarian,
    Italian,
    Norwegian,
    Portuguese,
    Romanian,
    Russian,
    Spanish,
    Swedish,
    Tamil,
    Turkish,
}

impl StemmerKind {
    pub fn parse(name: &str) -> Result<Self> {
        let kind = match name.to_lowercase().as_str() {
            "none" => Self::None,
            "porter" => Self::Porter,
            "arabic" => Self::Arabic,
            "danish" => Self::Danish,
            "dutch" => Self::Dutch,
            "english" => Self::English,
            "finnish" => Self::Finnish,
            "french" => Self::French,
            "german" => Self::German,
            "greek" => Self::Greek,
            "hungarian" => Self::Hungarian,
            "italian" => Self::Italian,
            "norwegian" => Self::Norwegian,
            "portuguese" => Self::Portuguese,
            "romanian" => Self::Romanian,
            "russian" => Self::Russian,
            "spanish" => Self::Spanish,
            "swedish" => Self::Swedish,
            "tamil" => Self::Tamil,
            "turkish" => Self::Turkish,
            other => {
                return Err(EngineError::invalid(format!("unknown stemmer: {other}")));
            }
        };
        Ok(kind)
    }

    fn algorithm(self) -> Option<Algorithm> {
        match self {
            Self::None => None,
            Self::Porter | Self::English => Some(Algorithm::English),
            Self::Arabic => Some(Algorithm::Arabic),
            Self::Danish => Some(Algorithm::Danish),
            Self::Dutch => Some(Algorithm::Dutch),
            Self::Finnish => Some(Algorithm::Finnish),
            Self::French => Some(Algorithm::French),
            Self::German => Some(Algorithm::German),
            Self::Greek => Some(Algorithm::Greek),
            Self::Hungarian => Some(Algorithm::Hungarian),
            Self::Italian => Some(Algorithm::Italian),
            Self::Norwegian => Some(Algorithm::Norwegian),
            Self::Portuguese => Some(Algorithm::Portuguese),
            Self::Romanian => Some(Algorithm::Romanian),
            Self::Russian => Some(Algorithm::Russian),
            Self::Spanish => Some(Algorithm::Spanish),
            Self::Swedish => Some(Algorithm::Swedish),
            Self::Tamil => Some(Algorithm::Tamil),
            Self::Turkish => Some(Algorithm::Turkish),
        }
    }
}

/// Stop words: either a built-in named list or an explicit set of surface
/// forms supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StopwordsSpec {
    Language(String),
    List(Vec<String>),
}

impl Default for StopwordsSpec {
    fn default() -> Self {
        StopwordsSpec::Language("english".to_string())
    }
}

/// The persisted analyzer settings. These are frozen into the index the
/// first time a corpus is created and reused verbatim afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerSettings {
    pub lower: bool,
    pub strip_accents: bool,
    pub ignore: String,
    pub stopwords: StopwordsSpec,
    pub stemmer: StemmerKind,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            lower: true,
            strip_accents: true,
            ignore: r"(\.|[^a-z])+".to_string(),
            stopwords: StopwordsSpec::default(),
            stemmer: StemmerKind::Porter,
        }
    }
}

/// A compiled analyzer: the settings with the regex built, the stop word
/// set resolved, and the stemmer instantiated.
pub struct Analyzer {
    lower: bool,
    strip_accents: bool,
    ignore: Option<Regex>,
    stopwords: AHashSet<String>,
    stemmer: Option<Stemmer>,
}

impl Analyzer {
    /// Compile the settings. Fails on a malformed ignore pattern or an
    /// unknown stop word language.
    pub fn compile(settings: &AnalyzerSettings) -> Result<Self> {
        let ignore = if settings.ignore.is_empty() {
            None
        } else {
            let re = Regex::new(&settings.ignore).map_err(|e| {
                EngineError::invalid(format!("ignore pattern {:?}: {e}", settings.ignore))
            })?;
            Some(re)
        };

        let stopwords = match &settings.stopwords {
            StopwordsSpec::Language(lang) => stopwords::named(lang)
                .ok_or_else(|| EngineError::invalid(format!("unknown stop word list: {lang}")))?
                .iter()
                .map(|w| w.to_string())
                .collect(),
            StopwordsSpec::List(words) => words.iter().map(|w| w.to_lowercase()).collect(),
        };

        Ok(Self {
            lower: settings.lower,
            strip_accents: settings.strip_accents,
            ignore,
            stopwords,
            stemmer: settings.stemmer.algorithm().map(Stemmer::create),
        })
    }

    /// Normalise a string into its ordered term sequence. Pure; an empty
    /// output is valid.
    pub fn analyze(&self, text: &str) -> Vec<String> {
        let mut text = if self.lower {
            text.to_lowercase()
        } else {
            text.to_string()
        };

        if self.strip_accents {
            text = text.nfkd().filter(|c| !is_combining_mark(*c)).collect();
        }

        let text = match &self.ignore {
            Some(re) => re.replace_all(&text, " "),
            None => std::borrow::Cow::Borrowed(text.as_str()),
        };

        text.split_whitespace()
            .filter(|word| !self.stopwords.contains(*word))
            .map(|word| match &self.stemmer {
                Some(stemmer) => stemmer.stem(word).to_string(),
                None => word.to_string(),
            })
            .collect()
    }
}
