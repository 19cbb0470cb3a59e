//! The ingest pipeline.
//!
//! Records flow through five phases: dedup against the document store,
//! batching, parallel tokenisation, sequential index writes, and a parallel
//! score rebuild for every term the batch touched. Re-running the same
//! records is a no-op (duplicates are counted as skipped).

use ahash::{AHashMap, AHashSet};
use rayon::prelude::*;
use tracing::debug;

use crate::analysis::Analyzer;
use crate::models::{DocumentRecord, Row, UploadSummary};

use super::scores::{Bm25Params, CorpusStats};
use super::{Created, Schema};

pub struct IngestOptions<'a> {
    /// Columns whose concatenated text is indexed.
    pub fields: &'a [String],
    /// Records per tokenisation batch.
    pub batch_size: usize,
    pub params: Bm25Params,
}

struct Analyzed {
    key: String,
    row: Row,
    term_freqs: AHashMap<String, u32>,
    length: u32,
}

/// Ingest a stream of records into a schema. Malformed records (empty key)
/// fail individually; duplicate keys are skipped; everything else lands
/// atomically with refreshed stats and score lists.
pub fn ingest(
    schema: &mut Schema,
    records: Vec<DocumentRecord>,
    analyzer: &Analyzer,
    opts: &IngestOptions,
) -> UploadSummary {
    let mut summary = UploadSummary::default();

    // Phase 1: drop malformed records, then dedup against the store and
    // within the call itself (first occurrence wins).
    let mut fresh: Vec<DocumentRecord> = Vec::with_capacity(records.len());
    let mut seen_keys: AHashSet<String> = AHashSet::new();
    for record in records {
        if record.key.is_empty() {
            summary.failed += 1;
            continue;
        }
        if schema.documents.contains_key(&record.key) || !seen_keys.insert(record.key.clone()) {
            summary.skipped += 1;
            continue;
        }
        fresh.push(record);
    }
    if fresh.is_empty() {
        return summary;
    }

    let batch_size = opts.batch_size.max(1);
    let mut affected: AHashSet<u32> = AHashSet::new();

    for batch in fresh.chunks(batch_size) {
        // Phase 3a/3b: tokenise the batch in parallel.
        let analyzed: Vec<Analyzed> = batch
            .par_iter()
            .map(|record| {
                let text = indexed_text(&record.row, opts.fields);
                let terms = analyzer.analyze(&text);
                let length = terms.len() as u32;
                let mut term_freqs: AHashMap<String, u32> = AHashMap::new();
                for term in terms {
                    *term_freqs.entry(term).or_insert(0) += 1;
                }
                Analyzed {
                    key: record.key.clone(),
                    row: record.row.clone(),
                    term_freqs,
                    length,
                }
            })
            .collect();

        // Phase 3c/3d: single-writer index updates.
        for doc in analyzed {
            let doc_id = match schema.documents.create(&doc.key, doc.length, doc.row) {
                Created::Fresh(id) => id,
                // unreachable after dedup, but harmless to honour
                Created::Existing(_) => {
                    summary.skipped += 1;
                    continue;
                }
            };

            let mut term_freqs: Vec<(u32, u32)> = doc
                .term_freqs
                .iter()
                .map(|(surface, &tf)| (schema.dictionary.intern(surface), tf))
                .collect();
            term_freqs.sort_unstable_by_key(|&(term_id, _)| term_id);

            for &(term_id, _) in &term_freqs {
                schema.dictionary.bump_df(term_id, 1);
                affected.insert(term_id);
            }
            schema.postings.insert_doc(doc_id, &term_freqs);
            summary.inserted += 1;
        }
    }

    // Phases 4 and 5: refresh stats, then rebuild every touched term with
    // the new N and avgdl. Untouched terms keep their arrays; their scores
    // drift slightly with avgdl, which is accepted and bounded by corpus
    // growth between ingests.
    schema.stats = CorpusStats::recompute(&schema.documents);
    let affected: Vec<u32> = affected.into_iter().collect();
    schema.scores.rebuild_terms(
        &affected,
        &schema.postings,
        &schema.documents,
        schema.stats,
        opts.params,
    );

    debug!(
        inserted = summary.inserted,
        skipped = summary.skipped,
        failed = summary.failed,
        terms_rebuilt = affected.len(),
        "ingest complete"
    );
    summary
}

/// Concatenate the indexed columns of a row into one text. Missing columns
/// contribute nothing; scalar values are rendered, arrays recurse.
fn indexed_text(row: &Row, fields: &[String]) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(fields.len());
    for field in fields {
        if let Some(value) = row.get(field) {
            let text = value_text(value);
            if !text.is_empty() {
                parts.push(text);
            }
        }
    }
    parts.join(" ")
}

fn value_text(value: &serde_json::Value) -> String {
    use serde_json::Value;
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        Value::Null | Value::Object(_) => String::new(),
    }
}
