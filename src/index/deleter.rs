//! The delete pipeline, symmetric to ingest: drop postings and lengths,
//! repair document frequencies, refresh stats, and rebuild the score lists
//! of every term that referenced a deleted document.

use ahash::AHashSet;
use tracing::debug;

use crate::models::DeleteSummary;

use super::scores::{Bm25Params, CorpusStats};
use super::Schema;

/// Delete documents by external key. Unknown keys are counted as missing
/// and nothing else changes; deleting from an empty set is a no-op.
pub fn delete_by_keys(schema: &mut Schema, keys: &[String], params: Bm25Params) -> DeleteSummary {
    let mut summary = DeleteSummary::default();
    let mut doc_ids: Vec<u32> = Vec::with_capacity(keys.len());
    let mut seen: AHashSet<u32> = AHashSet::new();
    for key in keys {
        match schema.documents.id_for_key(key) {
            Some(id) if seen.insert(id) => doc_ids.push(id),
            Some(_) => summary.missing += 1, // repeated key in the same call
            None => summary.missing += 1,
        }
    }
    if doc_ids.is_empty() {
        return summary;
    }

    let mut affected: AHashSet<u32> = AHashSet::new();
    for doc_id in doc_ids {
        let removed = schema.postings.delete_by_doc(doc_id);
        for (term_id, _) in removed {
            schema.dictionary.bump_df(term_id, -1);
            affected.insert(term_id);
        }
        schema.documents.delete(doc_id);
        summary.deleted += 1;
    }

    schema.stats = CorpusStats::recompute(&schema.documents);
    let affected: Vec<u32> = affected.into_iter().collect();
    schema.scores.rebuild_terms(
        &affected,
        &schema.postings,
        &schema.documents,
        schema.stats,
        params,
    );

    debug!(
        deleted = summary.deleted,
        missing = summary.missing,
        terms_rebuilt = affected.len(),
        "delete complete"
    );
    summary
}
