//! # Fathom
//!
//! Fathom is an embedded document search engine built around Okapi BM25
//! ranking, with an optional graph re-ranking path that propagates
//! relevance between documents and previously observed queries.
//!
//! The crate provides both a command-line interface and a library that can
//! be embedded in other Rust applications.
//!
//! ## Features
//!
//! - Incremental ingestion into a persistent inverted index with
//!   precomputed per-term score lists
//! - Batched top-k retrieval with structured row filters and order-by
//! - A stored-query index and weighted document↔query edges for hybrid
//!   re-ranking
//! - Ranking evaluation (precision, recall, NDCG) against relevance
//!   judgments
//!
//! ## Example
//!
//! ```no_run
//! use fathom_search::engine::{SearchEngine, SearchRequest, RuntimeOptions};
//! use fathom_search::models::DocumentRecord;
//!
//! let engine = SearchEngine::open("./.fathom/index", None, RuntimeOptions::default()).unwrap();
//!
//! let records: Vec<DocumentRecord> = serde_json::from_str(
//!     r#"[{"key": "a", "title": "the cat sat"}]"#,
//! ).unwrap();
//! engine.upload_documents(records, &["title".to_string()]).unwrap();
//!
//! let results = engine.search_documents(
//!     &["cat".to_string()],
//!     &SearchRequest { top_k: 10, top_k_token: 10_000, ..Default::default() },
//! ).unwrap();
//! println!("{} hits", results[0].hits.len());
//! ```

pub mod analysis;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod eval;
pub mod index;
pub mod models;
pub mod search;
pub mod stopwords;
pub mod storage;

// Re-export commonly used types for convenience
pub use analysis::{Analyzer, AnalyzerSettings, StemmerKind, StopwordsSpec};
pub use engine::{GraphRequest, IndexSettings, RuntimeOptions, SearchEngine, SearchRequest};
pub use error::{EngineError, Result};
pub use models::{DeleteSummary, DocumentRecord, Hit, QueryHits, QueryRecord, UploadSummary};
