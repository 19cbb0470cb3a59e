use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// The raw `(doc_id, term_id, tf)` tuples, kept in both orientations: the
/// scorer walks a term's documents, the deleter walks a document's terms.
/// The two maps always describe the same tuple set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostingStore {
    by_term: AHashMap<u32, AHashMap<u32, u32>>,
    by_doc: AHashMap<u32, Vec<(u32, u32)>>,
}

impl PostingStore {
    /// Insert all postings of one document. `term_freqs` must not repeat a
    /// term id and every tf must be positive.
    pub fn insert_doc(&mut self, doc_id: u32, term_freqs: &[(u32, u32)]) {
        for &(term_id, tf) in term_freqs {
            debug_assert!(tf > 0);
            self.by_term.entry(term_id).or_default().insert(doc_id, tf);
        }
        self.by_doc.insert(doc_id, term_freqs.to_vec());
    }

    /// Drop every posting of a document, returning its `(term_id, tf)` list
    /// so the caller can repair document frequencies.
    pub fn delete_by_doc(&mut self, doc_id: u32) -> Vec<(u32, u32)> {
        let terms = self.by_doc.remove(&doc_id).unwrap_or_default();
        for &(term_id, _) in &terms {
            if let Some(docs) = self.by_term.get_mut(&term_id) {
                docs.remove(&doc_id);
                if docs.is_empty() {
                    self.by_term.remove(&term_id);
                }
            }
        }
        terms
    }

    /// All `(doc_id, tf)` pairs for a term.
    pub fn term_postings(&self, term_id: u32) -> Option<&AHashMap<u32, u32>> {
        self.by_term.get(&term_id)
    }

    /// All `(term_id, tf)` pairs for a document.
    pub fn doc_postings(&self, doc_id: u32) -> Option<&[(u32, u32)]> {
        self.by_doc.get(&doc_id).map(|v| v.as_slice())
    }

    pub fn tf(&self, doc_id: u32, term_id: u32) -> u32 {
        self.by_term
            .get(&term_id)
            .and_then(|docs| docs.get(&doc_id))
            .copied()
            .unwrap_or(0)
    }

    /// Number of distinct documents carrying a term.
    pub fn doc_count(&self, term_id: u32) -> u32 {
        self.by_term.get(&term_id).map_or(0, |docs| docs.len() as u32)
    }

    pub fn term_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.by_term.keys().copied()
    }
}
