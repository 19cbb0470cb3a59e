//! The BM25 kernel and the precomputed score store.
//!
//! Scoring work happens once, at indexing time: for every term the store
//! materialises two parallel arrays `docs[]` / `scores[]` sorted by score
//! descending (doc id ascending on ties). Query execution then reduces to
//! slicing the head of each queried term's arrays and summing, which keeps
//! the hot path free of per-document arithmetic.

use ahash::AHashMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::documents::DocumentStore;
use super::postings::PostingStore;

/// Okapi BM25 parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Params {
    /// Term frequency saturation.
    pub k1: f32,
    /// Document length normalisation strength.
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// Live corpus statistics, refreshed after every ingest and delete.
///
/// Empty documents count toward `doc_count` but are excluded from the
/// `avgdl` mean; an index holding only empty documents has `avgdl == 0`
/// and every score is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusStats {
    pub doc_count: u32,
    pub avgdl: f32,
}

impl CorpusStats {
    pub fn recompute(documents: &DocumentStore) -> Self {
        let doc_count = documents.len() as u32;
        let mut sum = 0u64;
        let mut counted = 0u64;
        for (_, doc) in documents.iter() {
            if doc.length > 0 {
                sum += doc.length as u64;
                counted += 1;
            }
        }
        let avgdl = if counted > 0 {
            sum as f32 / counted as f32
        } else {
            0.0
        };
        Self { doc_count, avgdl }
    }
}

/// The per-(term, document) BM25 weight:
///
/// ```text
/// idf   = ln( (N - df + 0.5) / (df + 0.5) + 1 )
/// norm  = k1 * (1 - b + b * len / avgdl)
/// score = tf * idf / (tf + norm)
/// ```
pub fn bm25_weight(tf: u32, df: u32, doc_len: u32, stats: CorpusStats, params: Bm25Params) -> f32 {
    if tf == 0 || df == 0 || stats.avgdl <= 0.0 {
        return 0.0;
    }
    let n = stats.doc_count as f32;
    let df = df as f32;
    let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
    let norm = params.k1 * (1.0 - params.b + params.b * doc_len as f32 / stats.avgdl);
    let tf = tf as f32;
    tf * idf / (tf + norm)
}

/// One term's materialised posting list: equal-length arrays sorted by
/// score descending, doc id ascending on ties.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub docs: Vec<u32>,
    pub scores: Vec<f32>,
}

impl ScoreEntry {
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// The head of the list, at most `limit` entries.
    pub fn head(&self, limit: usize) -> (&[u32], &[f32]) {
        let n = self.docs.len().min(limit);
        (&self.docs[..n], &self.scores[..n])
    }
}

/// Term id → score entry. Entries exist only for terms with at least one
/// live posting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreStore {
    entries: AHashMap<u32, ScoreEntry>,
}

impl ScoreStore {
    pub fn entry(&self, term_id: u32) -> Option<&ScoreEntry> {
        self.entries.get(&term_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &ScoreEntry)> {
        self.entries.iter().map(|(&id, e)| (id, e))
    }

    /// Rebuild the listed terms from the current postings and stats. Terms
    /// whose rebuilt list comes out empty are removed. Work is parallel
    /// over terms; untouched terms keep their arrays.
    pub fn rebuild_terms(
        &mut self,
        term_ids: &[u32],
        postings: &PostingStore,
        documents: &DocumentStore,
        stats: CorpusStats,
        params: Bm25Params,
    ) {
        let rebuilt: Vec<(u32, Option<ScoreEntry>)> = term_ids
            .par_iter()
            .map(|&term_id| (term_id, build_entry(term_id, postings, documents, stats, params)))
            .collect();

        for (term_id, entry) in rebuilt {
            match entry {
                Some(entry) => {
                    self.entries.insert(term_id, entry);
                }
                None => {
                    self.entries.remove(&term_id);
                }
            }
        }
    }
}

fn build_entry(
    term_id: u32,
    postings: &PostingStore,
    documents: &DocumentStore,
    stats: CorpusStats,
    params: Bm25Params,
) -> Option<ScoreEntry> {
    let term_docs = postings.term_postings(term_id)?;
    if term_docs.is_empty() {
        return None;
    }
    let df = term_docs.len() as u32;

    let mut scored: Vec<(u32, f32)> = term_docs
        .iter()
        .filter_map(|(&doc_id, &tf)| {
            let doc_len = documents.get_length(doc_id)?;
            Some((doc_id, bm25_weight(tf, df, doc_len, stats, params)))
        })
        .collect();
    if scored.is_empty() {
        return None;
    }

    scored.sort_unstable_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    let (docs, scores) = scored.into_iter().unzip();
    Some(ScoreEntry { docs, scores })
}
