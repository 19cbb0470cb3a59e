//! The inverted index: dictionaries, documents, raw postings, precomputed
//! score lists, and the ingest/delete pipelines that keep them consistent.

pub mod deleter;
pub mod dictionary;
pub mod documents;
pub mod indexer;
pub mod postings;
pub mod scores;

#[cfg(test)]
mod indexer_tests;

use serde::{Deserialize, Serialize};

pub use deleter::delete_by_keys;
pub use dictionary::TermDictionary;
pub use documents::{Created, DocumentStore, StoredDocument};
pub use indexer::{ingest, IngestOptions};
pub use postings::PostingStore;
pub use scores::{bm25_weight, Bm25Params, CorpusStats, ScoreEntry, ScoreStore};

/// One complete index namespace. The engine holds two: one over documents
/// and one over the stored-query texts used by the graph path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    pub dictionary: TermDictionary,
    pub documents: DocumentStore,
    pub postings: PostingStore,
    pub scores: ScoreStore,
    pub stats: CorpusStats,
}

impl Schema {
    /// Debug-and-test consistency sweep over the whole namespace. Checks
    /// the structural invariants that every public mutation must preserve:
    /// parallel array lengths, sort order, liveness of referenced doc ids,
    /// stats freshness, and df agreement with the posting tuples.
    pub fn check_invariants(&self) -> Result<(), String> {
        for (term_id, entry) in self.scores.iter() {
            if entry.docs.len() != entry.scores.len() {
                return Err(format!("term {term_id}: docs/scores length mismatch"));
            }
            for i in 1..entry.docs.len() {
                let (prev, cur) = (entry.scores[i - 1], entry.scores[i]);
                if cur > prev {
                    return Err(format!("term {term_id}: scores not descending at {i}"));
                }
                if cur == prev && entry.docs[i - 1] >= entry.docs[i] {
                    return Err(format!("term {term_id}: doc tiebreak violated at {i}"));
                }
            }
            let mut seen = ahash::AHashSet::new();
            for &doc_id in &entry.docs {
                if !seen.insert(doc_id) {
                    return Err(format!("term {term_id}: duplicate doc {doc_id}"));
                }
                if self.documents.get(doc_id).is_none() {
                    return Err(format!("term {term_id}: dead doc {doc_id}"));
                }
            }
        }

        let stats = CorpusStats::recompute(&self.documents);
        if stats != self.stats {
            return Err(format!(
                "stale stats: stored {:?}, recomputed {:?}",
                self.stats, stats
            ));
        }

        for (term_id, entry) in self.dictionary.iter() {
            let live = self.postings.doc_count(term_id);
            if entry.df != live {
                return Err(format!(
                    "term {term_id} ({}): df {} but {} live postings",
                    entry.surface, entry.df, live
                ));
            }
        }

        for (doc_id, _) in self.documents.iter() {
            if let Some(terms) = self.postings.doc_postings(doc_id) {
                for &(term_id, tf) in terms {
                    if tf == 0 {
                        return Err(format!("doc {doc_id}: zero tf for term {term_id}"));
                    }
                }
            }
        }

        Ok(())
    }
}
