use serde::{Deserialize, Serialize};

/// A user-facing record: typed columns keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// One document handed to the indexer: the caller-supplied primary key plus
/// the row of typed columns used for filtering and hydration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub key: String,
    #[serde(flatten)]
    pub row: Row,
}

/// A stored-query record for the graph index, optionally carrying weighted
/// edges to existing documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRecord {
    pub query: String,
    #[serde(default)]
    pub documents: Vec<EdgeSpec>,
}

/// One edge attachment: target document by external key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub key: String,
    #[serde(default = "default_edge_weight")]
    pub weight: f32,
}

fn default_edge_weight() -> f32 {
    1.0
}

/// A single ranked result with its hydrated row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hit {
    pub doc_id: u32,
    pub key: String,
    pub score: f32,
    pub row: Row,
}

/// Ranked results for one query of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryHits {
    pub query: String,
    pub hits: Vec<Hit>,
    /// True when a deadline expired mid-execution and the ranking was
    /// assembled from the posting slices fetched up to that point.
    pub partial: bool,
}

/// Outcome of an upload call. `skipped` counts duplicate keys, `failed`
/// counts malformed records (and, for query uploads, edges pointing at
/// unknown document keys).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSummary {
    pub inserted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Outcome of a delete call. Unknown keys are counted, not errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteSummary {
    pub deleted: usize,
    pub missing: usize,
}
