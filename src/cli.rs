use clap::{Parser as ClapParser, Subcommand};
use std::path::PathBuf;

#[derive(ClapParser, Debug)]
#[command(
    author,
    version,
    about = "Embedded BM25 document search engine with graph-augmented re-ranking",
    long_about = None
)]
pub struct Args {
    /// Index directory (overrides configuration)
    #[arg(long, global = true)]
    pub index: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_parser = ["text", "json"])]
    pub format: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ingest documents from a JSON-lines file
    UploadDocuments {
        /// JSON-lines input, one row object per line
        #[arg(long)]
        input: PathBuf,

        /// Column holding the primary key
        #[arg(long, default_value = "id")]
        key: String,

        /// Columns whose text is indexed
        #[arg(long, value_delimiter = ',', required = true)]
        fields: Vec<String>,
    },

    /// Ingest stored queries (with optional document edges) from JSON-lines
    UploadQueries {
        /// JSON-lines input: {"query": "...", "documents": [{"key": "...", "weight": 1.0}]}
        #[arg(long)]
        input: PathBuf,
    },

    /// Ranked retrieval over the document corpus
    SearchDocuments {
        /// Query strings (one result list per query)
        #[arg(required = true)]
        queries: Vec<String>,

        #[arg(long)]
        top_k: Option<usize>,

        /// Posting-list slice length consulted per term
        #[arg(long)]
        top_k_token: Option<usize>,

        /// Row predicate, e.g. "year >= 1970 AND popularity > 8"
        #[arg(long)]
        filter: Option<String>,

        /// Result ordering, e.g. "year desc" (default: score)
        #[arg(long)]
        order_by: Option<String>,

        /// Per-batch deadline in milliseconds; expiry returns partial results
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Ranked retrieval over the stored-query texts
    SearchQueries {
        #[arg(required = true)]
        queries: Vec<String>,

        #[arg(long)]
        top_k: Option<usize>,

        #[arg(long)]
        top_k_token: Option<usize>,
    },

    /// Graph-augmented retrieval through document↔query edges
    SearchGraphs {
        #[arg(required = true)]
        queries: Vec<String>,

        #[arg(long)]
        top_k: Option<usize>,

        #[arg(long)]
        top_k_token: Option<usize>,

        /// Break equal final scores randomly instead of by document id
        #[arg(long)]
        random_tiebreak: bool,
    },

    /// Delete documents by external key
    DeleteDocuments {
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Score the engine's rankings against relevance judgments
    Evaluate {
        /// JSON-lines run queries: {"query_id": "...", "text": "..."}
        #[arg(long)]
        queries: PathBuf,

        /// TREC-style qrels: "query_id 0 doc_key relevance" per line
        #[arg(long)]
        qrels: PathBuf,

        /// Cutoffs to report
        #[arg(long, value_delimiter = ',', default_value = "10")]
        k: Vec<usize>,

        #[arg(long)]
        top_k: Option<usize>,

        #[arg(long)]
        top_k_token: Option<usize>,
    },
}
