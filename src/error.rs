use thiserror::Error;

/// Errors surfaced by the engine and its stores.
///
/// Unknown keys on delete and unknown terms in queries are not errors: they
/// produce empty results or no-op summaries. Duplicate keys on ingest are
/// reported through [`crate::models::UploadSummary::skipped`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed caller input: bad filter text, bad regex, illegal
    /// configuration value, analyzer settings conflicting with an existing
    /// index. No state change occurred.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A referenced entity does not exist. Used internally; the public
    /// surface maps this to empty results or skip counts.
    #[error("not found: {0}")]
    NotFound(String),

    /// A unique constraint was violated. Used internally; uploads map this
    /// to a skip count.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An I/O failure against the backing store. The in-memory state is
    /// rolled back to the last persisted snapshot.
    #[error("backing store failure: {0}")]
    Backend(#[from] std::io::Error),

    /// A snapshot could not be encoded or decoded.
    #[error("backing store codec failure: {0}")]
    Codec(#[from] serde_json::Error),

    /// The store stayed contended through every retry attempt.
    #[error("backing store busy after {attempts} attempts: {source}")]
    Transient {
        attempts: u32,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        EngineError::InvalidInput(msg.into())
    }
}
