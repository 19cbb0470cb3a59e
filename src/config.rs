//! Layered configuration: defaults ← global file ← project file ←
//! environment ← CLI flags. All file fields are optional so partial
//! configurations merge cleanly; `resolve_with_defaults` produces the
//! concrete values the engine runs with.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::analysis::{AnalyzerSettings, StemmerKind, StopwordsSpec};
use crate::index::Bm25Params;

/// On-disk configuration. Every field optional; later layers win.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FathomConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<EngineSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analyzer: Option<AnalyzerSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bm25: Option<Bm25Section>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingest: Option<IngestSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_dir: Option<PathBuf>,
    /// Worker pool size; -1 means all cores.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_jobs: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnalyzerSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stemmer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopwords: Option<StopwordsSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strip_accents: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Bm25Section {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k1: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k_token: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_top_k_token: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IngestSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
}

/// Configuration with every value resolved.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub index_dir: PathBuf,
    pub n_jobs: i32,
    pub log_level: String,
    pub format: OutputFormat,
    pub analyzer: AnalyzerSettings,
    /// True when any analyzer or BM25 value was supplied explicitly, which
    /// must match the settings persisted with an existing index.
    pub analyzer_overridden: bool,
    pub bm25: Bm25Params,
    pub top_k: usize,
    pub top_k_token: usize,
    pub graph_top_k_token: usize,
    pub query_batch_size: usize,
    pub ingest_batch_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl FathomConfig {
    /// Load and merge every configuration layer, then resolve.
    pub fn load() -> Result<ResolvedConfig> {
        let mut merged = FathomConfig::default();
        for path in Self::config_paths() {
            if let Some(config) = Self::load_from_file(&path)? {
                merged = Self::merge(merged, config);
            }
        }
        merged.apply_env_overrides()?;
        merged.resolve_with_defaults()
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(home) = env::var_os("HOME").map(PathBuf::from).or_else(dirs::home_dir) {
            paths.push(home.join(".fathom").join("settings.json"));
        }
        paths.push(PathBuf::from(".fathom").join("settings.json"));
        if let Ok(custom) = env::var("FATHOM_CONFIG_PATH") {
            paths.push(PathBuf::from(custom));
        }
        paths
    }

    fn load_from_file(path: &Path) -> Result<Option<FathomConfig>> {
        match fs::metadata(path) {
            Ok(meta) if meta.is_file() => {}
            _ => return Ok(None),
        }
        let bytes = fs::read(path).context(format!("failed to read config file {path:?}"))?;
        let config = serde_json::from_slice(&bytes)
            .context(format!("failed to parse config file {path:?}"))?;
        Ok(Some(config))
    }

    fn merge(mut base: FathomConfig, other: FathomConfig) -> FathomConfig {
        if let Some(other_engine) = other.engine {
            let engine = base.engine.get_or_insert_with(EngineSection::default);
            if other_engine.index_dir.is_some() {
                engine.index_dir = other_engine.index_dir;
            }
            if other_engine.n_jobs.is_some() {
                engine.n_jobs = other_engine.n_jobs;
            }
            if other_engine.log_level.is_some() {
                engine.log_level = other_engine.log_level;
            }
            if other_engine.format.is_some() {
                engine.format = other_engine.format;
            }
        }
        if let Some(other_analyzer) = other.analyzer {
            let analyzer = base.analyzer.get_or_insert_with(AnalyzerSection::default);
            if other_analyzer.stemmer.is_some() {
                analyzer.stemmer = other_analyzer.stemmer;
            }
            if other_analyzer.stopwords.is_some() {
                analyzer.stopwords = other_analyzer.stopwords;
            }
            if other_analyzer.ignore.is_some() {
                analyzer.ignore = other_analyzer.ignore;
            }
            if other_analyzer.strip_accents.is_some() {
                analyzer.strip_accents = other_analyzer.strip_accents;
            }
            if other_analyzer.lower.is_some() {
                analyzer.lower = other_analyzer.lower;
            }
        }
        if let Some(other_bm25) = other.bm25 {
            let bm25 = base.bm25.get_or_insert_with(Bm25Section::default);
            if other_bm25.k1.is_some() {
                bm25.k1 = other_bm25.k1;
            }
            if other_bm25.b.is_some() {
                bm25.b = other_bm25.b;
            }
        }
        if let Some(other_search) = other.search {
            let search = base.search.get_or_insert_with(SearchSection::default);
            if other_search.top_k.is_some() {
                search.top_k = other_search.top_k;
            }
            if other_search.top_k_token.is_some() {
                search.top_k_token = other_search.top_k_token;
            }
            if other_search.graph_top_k_token.is_some() {
                search.graph_top_k_token = other_search.graph_top_k_token;
            }
            if other_search.batch_size.is_some() {
                search.batch_size = other_search.batch_size;
            }
        }
        if let Some(other_ingest) = other.ingest {
            let ingest = base.ingest.get_or_insert_with(IngestSection::default);
            if other_ingest.batch_size.is_some() {
                ingest.batch_size = other_ingest.batch_size;
            }
        }
        base
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        let engine = self.engine.get_or_insert_with(EngineSection::default);
        if let Ok(val) = env::var("FATHOM_INDEX_DIR") {
            engine.index_dir = Some(PathBuf::from(val));
        }
        if let Ok(val) = env::var("FATHOM_N_JOBS") {
            engine.n_jobs = Some(val.parse().context("FATHOM_N_JOBS must be an integer")?);
        }
        if let Ok(val) = env::var("FATHOM_LOG_LEVEL") {
            engine.log_level = Some(val);
        }
        if let Ok(val) = env::var("FATHOM_FORMAT") {
            engine.format = Some(val);
        }

        let analyzer = self.analyzer.get_or_insert_with(AnalyzerSection::default);
        if let Ok(val) = env::var("FATHOM_STEMMER") {
            analyzer.stemmer = Some(val);
        }
        if let Ok(val) = env::var("FATHOM_STOPWORDS") {
            // a comma-separated value is an explicit list, otherwise a language name
            analyzer.stopwords = Some(if val.contains(',') {
                StopwordsSpec::List(val.split(',').map(|w| w.trim().to_string()).collect())
            } else {
                StopwordsSpec::Language(val)
            });
        }
        if let Ok(val) = env::var("FATHOM_IGNORE") {
            analyzer.ignore = Some(val);
        }
        if let Ok(val) = env::var("FATHOM_STRIP_ACCENTS") {
            analyzer.strip_accents = Some(parse_bool(&val));
        }
        if let Ok(val) = env::var("FATHOM_LOWER") {
            analyzer.lower = Some(parse_bool(&val));
        }

        let bm25 = self.bm25.get_or_insert_with(Bm25Section::default);
        if let Ok(val) = env::var("FATHOM_K1") {
            bm25.k1 = Some(val.parse().context("FATHOM_K1 must be a number")?);
        }
        if let Ok(val) = env::var("FATHOM_B") {
            bm25.b = Some(val.parse().context("FATHOM_B must be a number")?);
        }

        let search = self.search.get_or_insert_with(SearchSection::default);
        if let Ok(val) = env::var("FATHOM_TOP_K") {
            search.top_k = Some(val.parse().context("FATHOM_TOP_K must be an integer")?);
        }
        if let Ok(val) = env::var("FATHOM_TOP_K_TOKEN") {
            search.top_k_token = Some(
                val.parse()
                    .context("FATHOM_TOP_K_TOKEN must be an integer")?,
            );
        }

        let ingest = self.ingest.get_or_insert_with(IngestSection::default);
        if let Ok(val) = env::var("FATHOM_BATCH_SIZE") {
            ingest.batch_size = Some(val.parse().context("FATHOM_BATCH_SIZE must be an integer")?);
        }
        Ok(())
    }

    fn analyzer_overridden(&self) -> bool {
        let analyzer_set = self.analyzer.as_ref().is_some_and(|a| {
            a.stemmer.is_some()
                || a.stopwords.is_some()
                || a.ignore.is_some()
                || a.strip_accents.is_some()
                || a.lower.is_some()
        });
        let bm25_set = self
            .bm25
            .as_ref()
            .is_some_and(|b| b.k1.is_some() || b.b.is_some());
        analyzer_set || bm25_set
    }

    /// Apply defaults and validate. Illegal values fail here, before any
    /// state is touched.
    pub fn resolve_with_defaults(self) -> Result<ResolvedConfig> {
        let analyzer_overridden = self.analyzer_overridden();
        let engine = self.engine.unwrap_or_default();
        let analyzer = self.analyzer.unwrap_or_default();
        let bm25 = self.bm25.unwrap_or_default();
        let search = self.search.unwrap_or_default();
        let ingest = self.ingest.unwrap_or_default();

        let defaults = AnalyzerSettings::default();
        let stemmer = match &analyzer.stemmer {
            Some(name) => StemmerKind::parse(name)?,
            None => defaults.stemmer,
        };
        let analyzer = AnalyzerSettings {
            lower: analyzer.lower.unwrap_or(defaults.lower),
            strip_accents: analyzer.strip_accents.unwrap_or(defaults.strip_accents),
            ignore: analyzer.ignore.unwrap_or(defaults.ignore),
            stopwords: analyzer.stopwords.unwrap_or(defaults.stopwords),
            stemmer,
        };
        // compile once to reject bad patterns and unknown stop word lists
        crate::analysis::Analyzer::compile(&analyzer)?;

        let bm25 = Bm25Params {
            k1: bm25.k1.unwrap_or(1.5),
            b: bm25.b.unwrap_or(0.75),
        };
        anyhow::ensure!(
            bm25.k1.is_finite() && bm25.k1 > 0.0,
            "k1 must be positive, got {}",
            bm25.k1
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&bm25.b),
            "b must be within [0, 1], got {}",
            bm25.b
        );

        let format = match engine.format.as_deref().unwrap_or("text") {
            "text" => OutputFormat::Text,
            "json" => OutputFormat::Json,
            other => anyhow::bail!("invalid output format: {other}"),
        };
        let log_level = engine.log_level.unwrap_or_else(|| "info".to_string());
        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        anyhow::ensure!(
            valid_levels.contains(&log_level.to_lowercase().as_str()),
            "invalid log level: {log_level}"
        );

        Ok(ResolvedConfig {
            index_dir: engine
                .index_dir
                .unwrap_or_else(|| PathBuf::from(".fathom").join("index")),
            n_jobs: engine.n_jobs.unwrap_or(-1),
            log_level,
            format,
            analyzer,
            analyzer_overridden,
            bm25,
            top_k: search.top_k.unwrap_or(10),
            top_k_token: search.top_k_token.unwrap_or(30_000),
            graph_top_k_token: search.graph_top_k_token.unwrap_or(10_000),
            query_batch_size: search.batch_size.unwrap_or(32),
            ingest_batch_size: ingest.batch_size.unwrap_or(30_000),
        })
    }
}

fn parse_bool(val: &str) -> bool {
    val == "1" || val.eq_ignore_ascii_case("true")
}
