//! Batched query execution over a schema's precomputed score lists.
//!
//! Each query is tokenised with the exact pipeline the corpus was indexed
//! with, then scored by summing the head (`top_k_token` entries) of every
//! queried term's posting list. Truncation makes the ranking approximate;
//! `top_k_token >= max df` of the queried terms recovers exact BM25.

use ahash::AHashMap;
use rayon::prelude::*;
use std::time::Instant;

use crate::analysis::Analyzer;
use crate::index::Schema;
use crate::models::{Hit, QueryHits};

use super::filters::{FilterExpr, OrderBy};

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions<'a> {
    /// Results returned per query.
    pub top_k: usize,
    /// Posting-list slice length consulted per term.
    pub top_k_token: usize,
    /// Queries per worker-pool unit.
    pub batch_size: usize,
    pub filter: Option<&'a FilterExpr>,
    pub order_by: Option<&'a OrderBy>,
    /// Expiry instant; past it, queries return what the already-fetched
    /// slices support and flag themselves partial.
    pub deadline: Option<Instant>,
}

/// Execute a batch of queries. Results come back in input order; sibling
/// queries are independent.
pub fn execute_batch(
    schema: &Schema,
    analyzer: &Analyzer,
    queries: &[String],
    opts: &ExecuteOptions,
) -> Vec<QueryHits> {
    let batch_size = opts.batch_size.max(1);
    queries
        .par_chunks(batch_size)
        .flat_map_iter(|chunk| {
            chunk
                .iter()
                .map(|query| execute_one(schema, analyzer, query, opts))
        })
        .collect()
}

/// Execute a single query against a schema.
pub fn execute_one(
    schema: &Schema,
    analyzer: &Analyzer,
    query: &str,
    opts: &ExecuteOptions,
) -> QueryHits {
    let accumulated = accumulate(schema, analyzer, query, opts);
    let mut candidates = rank_candidates(schema, accumulated.scores, opts);

    truncate_and_order(&mut candidates, schema, opts);

    QueryHits {
        query: query.to_string(),
        hits: hydrate(schema, &candidates),
        partial: accumulated.partial,
    }
}

pub(crate) struct Accumulated {
    pub scores: AHashMap<u32, f32>,
    pub partial: bool,
}

/// Sum posting-slice scores for every candidate document of one query.
/// Terms absent from the dictionary contribute zero; a repeated query term
/// contributes once per occurrence (multiset semantics).
pub(crate) fn accumulate(
    schema: &Schema,
    analyzer: &Analyzer,
    query: &str,
    opts: &ExecuteOptions,
) -> Accumulated {
    let mut scores: AHashMap<u32, f32> = AHashMap::new();
    let mut partial = false;

    for term in analyzer.analyze(query) {
        if let Some(deadline) = opts.deadline {
            if Instant::now() >= deadline {
                partial = true;
                break;
            }
        }
        let Some(term_id) = schema.dictionary.lookup(&term) else {
            continue;
        };
        let Some(entry) = schema.scores.entry(term_id) else {
            continue;
        };
        let (docs, slice_scores) = entry.head(opts.top_k_token);
        for (&doc_id, &score) in docs.iter().zip(slice_scores.iter()) {
            *scores.entry(doc_id).or_insert(0.0) += score;
        }
    }

    Accumulated { scores, partial }
}

/// Apply the filter and sort score descending, doc id ascending.
fn rank_candidates(
    schema: &Schema,
    scores: AHashMap<u32, f32>,
    opts: &ExecuteOptions,
) -> Vec<(u32, f32)> {
    let mut candidates: Vec<(u32, f32)> = match opts.filter {
        Some(filter) => scores
            .into_iter()
            .filter(|&(doc_id, _)| {
                schema
                    .documents
                    .get(doc_id)
                    .is_some_and(|doc| filter.matches(&doc.row))
            })
            .collect(),
        None => scores.into_iter().collect(),
    };

    candidates.sort_unstable_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    candidates
}

/// Keep the top-k, then let an order-by expression re-order just that
/// page. Candidate selection stays score-driven either way.
fn truncate_and_order(candidates: &mut Vec<(u32, f32)>, schema: &Schema, opts: &ExecuteOptions) {
    candidates.truncate(opts.top_k);

    let Some(order) = opts.order_by else { return };
    if order.column == "score" {
        if !order.descending {
            candidates.reverse();
        }
        return;
    }

    candidates.sort_by(|a, b| {
        let left = schema.documents.get(a.0).and_then(|d| d.row.get(&order.column));
        let right = schema.documents.get(b.0).and_then(|d| d.row.get(&order.column));
        let ord = compare_values(left, right);
        let ord = if order.descending { ord.reverse() } else { ord };
        ord.then_with(|| a.0.cmp(&b.0))
    });
}

/// Total order over row values: numbers, then strings, then booleans;
/// missing values sort last regardless of direction.
fn compare_values(
    left: Option<&serde_json::Value>,
    right: Option<&serde_json::Value>,
) -> std::cmp::Ordering {
    use serde_json::Value;
    use std::cmp::Ordering;

    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Number(x), Value::Number(y)) => {
                let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
            (Value::String(x), Value::String(y)) => x.cmp(y),
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            _ => Ordering::Equal,
        },
    }
}

fn hydrate(schema: &Schema, candidates: &[(u32, f32)]) -> Vec<Hit> {
    candidates
        .iter()
        .filter_map(|&(doc_id, score)| {
            let doc = schema.documents.get(doc_id)?;
            Some(Hit {
                doc_id,
                key: doc.external_key.clone(),
                score,
                row: doc.row.clone(),
            })
        })
        .collect()
}
