//! The engine facade: two index namespaces (documents and stored queries),
//! the edge store between them, and the single-writer / many-reader lock
//! discipline over the lot.
//!
//! Writers (uploads, deletes, stopword updates) hold the write lock for the
//! whole logical operation and persist a snapshot before returning; on a
//! persistence failure the in-memory state is rolled back to the last
//! snapshot, so readers never observe a half-applied operation.

use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::analysis::{Analyzer, AnalyzerSettings, StopwordsSpec};
use crate::error::{EngineError, Result};
use crate::eval::{evaluate, EvalReport, Qrels};
use crate::index::{self, Bm25Params, IngestOptions, Schema};
use crate::models::{DeleteSummary, DocumentRecord, QueryHits, QueryRecord, UploadSummary};
use crate::search::{self, EdgeStore, ExecuteOptions, GraphOptions};
use crate::storage;

const SETTINGS_FILE: &str = "settings.json";
const DOCUMENTS_FILE: &str = "documents.json";
const QUERIES_FILE: &str = "queries.json";
const EDGES_FILE: &str = "edges.json";

/// Analyzer and scoring settings frozen into an index when its first
/// corpus is created.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct IndexSettings {
    pub analyzer: AnalyzerSettings,
    pub bm25: Bm25Params,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            analyzer: AnalyzerSettings::default(),
            bm25: Bm25Params::default(),
        }
    }
}

/// Runtime knobs that are not part of the persisted index identity.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Worker pool size; -1 means all cores.
    pub n_jobs: i32,
    pub ingest_batch_size: usize,
    pub query_batch_size: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            n_jobs: -1,
            ingest_batch_size: 30_000,
            query_batch_size: 32,
        }
    }
}

/// One search call's parameters.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub top_k: usize,
    pub top_k_token: usize,
    pub filter: Option<String>,
    pub order_by: Option<String>,
    pub timeout: Option<Duration>,
}

/// Parameters for the graph path.
#[derive(Debug, Clone, Default)]
pub struct GraphRequest {
    pub top_k: usize,
    pub top_k_token: usize,
    pub random_tiebreak: bool,
    pub timeout: Option<Duration>,
}

struct EngineState {
    documents: Schema,
    queries: Schema,
    edges: EdgeStore,
    settings: IndexSettings,
    analyzer: Analyzer,
}

/// An open index. Cheap to share behind a reference; all methods take
/// `&self`.
pub struct SearchEngine {
    dir: PathBuf,
    state: RwLock<EngineState>,
    pool: rayon::ThreadPool,
    runtime: RuntimeOptions,
}

impl SearchEngine {
    /// Open (or create) the index at `dir`.
    ///
    /// A new index is stamped with `requested` settings (or defaults). An
    /// existing index keeps its persisted settings; passing `requested`
    /// settings that disagree with them is `InvalidInput`.
    pub fn open(
        dir: impl AsRef<Path>,
        requested: Option<IndexSettings>,
        runtime: RuntimeOptions,
    ) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();

        let persisted: Option<IndexSettings> = storage::load_json(&dir.join(SETTINGS_FILE))?;
        let settings = match (persisted, requested) {
            (Some(persisted), Some(requested)) if persisted != requested => {
                return Err(EngineError::invalid(format!(
                    "index at {dir:?} was created with different analyzer settings; \
                     delete and re-ingest to change them"
                )));
            }
            (Some(persisted), _) => persisted,
            (None, requested) => {
                let settings = requested.unwrap_or_default();
                storage::save_json(&dir.join(SETTINGS_FILE), &settings)?;
                settings
            }
        };

        let analyzer = Analyzer::compile(&settings.analyzer)?;
        let documents: Schema = storage::load_json(&dir.join(DOCUMENTS_FILE))?.unwrap_or_default();
        let queries: Schema = storage::load_json(&dir.join(QUERIES_FILE))?.unwrap_or_default();
        let edges = storage::load_json(&dir.join(EDGES_FILE))?.unwrap_or_default();

        let threads = if runtime.n_jobs < 0 {
            0 // rayon picks the core count
        } else {
            runtime.n_jobs.max(1) as usize
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("fathom-worker-{i}"))
            .build()
            .map_err(|e| EngineError::invalid(format!("worker pool: {e}")))?;

        info!(
            dir = %dir.display(),
            documents = documents.documents.len(),
            stored_queries = queries.documents.len(),
            "index opened"
        );

        Ok(Self {
            dir,
            state: RwLock::new(EngineState {
                documents,
                queries,
                edges,
                settings,
                analyzer,
            }),
            pool,
            runtime,
        })
    }

    /// Ingest document records. Duplicate keys are skipped, malformed
    /// records fail individually; the batch lands atomically.
    pub fn upload_documents(
        &self,
        records: Vec<DocumentRecord>,
        fields: &[String],
    ) -> Result<UploadSummary> {
        if fields.is_empty() {
            return Err(EngineError::invalid("at least one indexed field required"));
        }
        let mut state = self.write_lock()?;
        let opts = IngestOptions {
            fields,
            batch_size: self.runtime.ingest_batch_size,
            params: state.settings.bm25,
        };
        let summary = {
            let EngineState {
                documents, analyzer, ..
            } = &mut *state;
            self.pool
                .install(|| index::ingest(documents, records, analyzer, &opts))
        };
        self.persist_documents(&mut state)?;
        Ok(summary)
    }

    /// Ingest stored-query records and attach their edges. An edge aimed at
    /// an unknown document key fails that edge only.
    pub fn upload_queries(&self, records: Vec<QueryRecord>) -> Result<UploadSummary> {
        let mut state = self.write_lock()?;
        let fields = [QUERY_TEXT_FIELD.to_string()];
        let opts = IngestOptions {
            fields: &fields,
            batch_size: self.runtime.ingest_batch_size,
            params: state.settings.bm25,
        };

        let query_docs: Vec<DocumentRecord> = records
            .iter()
            .map(|record| {
                let mut row = crate::models::Row::new();
                row.insert(
                    QUERY_TEXT_FIELD.to_string(),
                    serde_json::Value::String(record.query.clone()),
                );
                DocumentRecord {
                    key: record.query.clone(),
                    row,
                }
            })
            .collect();

        let mut summary = {
            let EngineState {
                queries, analyzer, ..
            } = &mut *state;
            self.pool
                .install(|| index::ingest(queries, query_docs, analyzer, &opts))
        };

        for record in &records {
            let Some(query_id) = state.queries.documents.id_for_key(&record.query) else {
                continue; // the query record itself failed
            };
            for edge in &record.documents {
                match state.documents.documents.id_for_key(&edge.key) {
                    Some(document_id) => {
                        state.edges.upsert(document_id, query_id, edge.weight);
                    }
                    None => {
                        warn!(key = %edge.key, "edge target unknown, dropped");
                        summary.failed += 1;
                    }
                }
            }
        }

        self.persist_queries(&mut state)?;
        Ok(summary)
    }

    /// Ranked retrieval over the document corpus.
    pub fn search_documents(
        &self,
        queries: &[String],
        request: &SearchRequest,
    ) -> Result<Vec<QueryHits>> {
        let state = self.read_lock()?;
        self.run_search(&state, &state.documents, queries, request)
    }

    /// Ranked retrieval over the stored-query texts.
    pub fn search_queries(
        &self,
        queries: &[String],
        request: &SearchRequest,
    ) -> Result<Vec<QueryHits>> {
        let state = self.read_lock()?;
        self.run_search(&state, &state.queries, queries, request)
    }

    /// Graph-augmented retrieval: BM25 over documents and stored queries,
    /// joined through the edge set.
    pub fn search_graphs(
        &self,
        queries: &[String],
        request: &GraphRequest,
    ) -> Result<Vec<QueryHits>> {
        let state = self.read_lock()?;
        let opts = GraphOptions {
            top_k: request.top_k,
            top_k_token: request.top_k_token,
            batch_size: self.runtime.query_batch_size,
            random_tiebreak: request.random_tiebreak,
            deadline: request.timeout.map(|t| Instant::now() + t),
        };
        Ok(self.pool.install(|| {
            search::rerank_batch(
                &state.documents,
                &state.queries,
                &state.edges,
                &state.analyzer,
                queries,
                &opts,
            )
        }))
    }

    /// Delete documents by external key; unknown keys are a no-op.
    pub fn delete_documents(&self, keys: &[String]) -> Result<DeleteSummary> {
        let mut state = self.write_lock()?;
        let params = state.settings.bm25;
        let summary = {
            let documents = &mut state.documents;
            self.pool
                .install(|| index::delete_by_keys(documents, keys, params))
        };
        self.persist_documents(&mut state)?;
        Ok(summary)
    }

    /// Replace the runtime stop word set. Affects every later analysis
    /// call; already-indexed text is not re-tokenised.
    pub fn set_stopwords(&self, words: Vec<String>) -> Result<()> {
        let mut state = self.write_lock()?;
        let mut settings = state.settings.clone();
        settings.analyzer.stopwords = StopwordsSpec::List(words);
        let analyzer = Analyzer::compile(&settings.analyzer)?;

        storage::save_json(&self.dir.join(SETTINGS_FILE), &settings)?;
        state.settings = settings;
        state.analyzer = analyzer;
        Ok(())
    }

    /// Search the corpus for each run query, then score the rankings
    /// against relevance judgments.
    pub fn evaluate(
        &self,
        run_queries: &[(String, String)],
        qrels: &Qrels,
        ks: &[usize],
        request: &SearchRequest,
    ) -> Result<EvalReport> {
        let texts: Vec<String> = run_queries.iter().map(|(_, text)| text.clone()).collect();
        let results = self.search_documents(&texts, request)?;
        let run: Vec<(String, Vec<String>)> = run_queries
            .iter()
            .zip(results)
            .map(|((query_id, _), hits)| {
                (
                    query_id.clone(),
                    hits.hits.into_iter().map(|h| h.key).collect(),
                )
            })
            .collect();
        Ok(evaluate(&run, qrels, ks))
    }

    /// Sanity sweep used by the test suite.
    #[doc(hidden)]
    pub fn check_invariants(&self) -> Result<()> {
        let state = self.read_lock()?;
        state
            .documents
            .check_invariants()
            .and_then(|()| state.queries.check_invariants())
            .map_err(EngineError::invalid)
    }

    fn run_search(
        &self,
        state: &EngineState,
        schema: &Schema,
        queries: &[String],
        request: &SearchRequest,
    ) -> Result<Vec<QueryHits>> {
        let filter = request
            .filter
            .as_deref()
            .map(search::parse_filter)
            .transpose()?;
        let order_by = request
            .order_by
            .as_deref()
            .map(search::parse_order_by)
            .transpose()?;
        let opts = ExecuteOptions {
            top_k: request.top_k,
            top_k_token: request.top_k_token,
            batch_size: self.runtime.query_batch_size,
            filter: filter.as_ref(),
            order_by: order_by.as_ref(),
            deadline: request.timeout.map(|t| Instant::now() + t),
        };
        Ok(self
            .pool
            .install(|| search::execute_batch(schema, &state.analyzer, queries, &opts)))
    }

    /// Persist the document schema; on failure, restore memory from the
    /// last good snapshot so readers keep a consistent view.
    fn persist_documents(&self, state: &mut EngineState) -> Result<()> {
        if let Err(e) = storage::save_json(&self.dir.join(DOCUMENTS_FILE), &state.documents) {
            warn!(error = %e, "persist failed, rolling back document schema");
            state.documents = storage::load_json(&self.dir.join(DOCUMENTS_FILE))?.unwrap_or_default();
            return Err(e);
        }
        Ok(())
    }

    fn persist_queries(&self, state: &mut EngineState) -> Result<()> {
        let queries_path = self.dir.join(QUERIES_FILE);
        let edges_path = self.dir.join(EDGES_FILE);
        let result = storage::save_json(&queries_path, &state.queries)
            .and_then(|()| storage::save_json(&edges_path, &state.edges));
        if let Err(e) = result {
            warn!(error = %e, "persist failed, rolling back query schema");
            state.queries = storage::load_json(&queries_path)?.unwrap_or_default();
            state.edges = storage::load_json(&edges_path)?.unwrap_or_default();
            return Err(e);
        }
        Ok(())
    }

    fn read_lock(&self) -> Result<std::sync::RwLockReadGuard<'_, EngineState>> {
        self.state
            .read()
            .map_err(|_| EngineError::invalid("engine lock poisoned by an earlier panic"))
    }

    fn write_lock(&self) -> Result<std::sync::RwLockWriteGuard<'_, EngineState>> {
        self.state
            .write()
            .map_err(|_| EngineError::invalid("engine lock poisoned by an earlier panic"))
    }
}

/// Column under which a stored query's text lives in its own schema.
pub const QUERY_TEXT_FIELD: &str = "query";
