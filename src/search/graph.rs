//! Graph-augmented re-ranking over a bipartite document↔stored-query edge
//! set. BM25 over documents and BM25 over the stored-query texts are run
//! independently, joined through the induced edges, and recombined
//! additively; documents reachable only through an edge enter the ranking
//! with their edge-induced score alone.

use ahash::AHashMap;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::analysis::Analyzer;
use crate::index::Schema;
use crate::models::{Hit, QueryHits};

use super::executor::{accumulate, ExecuteOptions};

/// Weighted associations from stored queries to documents, unique per
/// `(document, query)` pair. Edges are keyed by the stored-query id because
/// scoring expands from the query side; edges pointing at deleted documents
/// stay in place (doc ids are never reused) and are skipped at scoring
/// time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EdgeStore {
    by_query: AHashMap<u32, Vec<(u32, f32)>>,
}

impl EdgeStore {
    /// Insert or overwrite the edge for a `(document, query)` pair.
    pub fn upsert(&mut self, document_id: u32, query_id: u32, weight: f32) {
        let edges = self.by_query.entry(query_id).or_default();
        match edges.iter_mut().find(|(doc, _)| *doc == document_id) {
            Some(edge) => edge.1 = weight,
            None => edges.push((document_id, weight)),
        }
    }

    pub fn for_query(&self, query_id: u32) -> &[(u32, f32)] {
        self.by_query
            .get(&query_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn edge_count(&self) -> usize {
        self.by_query.values().map(|v| v.len()).sum()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GraphOptions {
    pub top_k: usize,
    pub top_k_token: usize,
    pub batch_size: usize,
    /// Shuffle runs of equal final score instead of breaking ties by doc
    /// id. Off by default; the BM25-only paths are always deterministic.
    pub random_tiebreak: bool,
    pub deadline: Option<Instant>,
}

/// Re-rank a batch of input queries through the graph.
pub fn rerank_batch(
    documents: &Schema,
    stored_queries: &Schema,
    edges: &EdgeStore,
    analyzer: &Analyzer,
    queries: &[String],
    opts: &GraphOptions,
) -> Vec<QueryHits> {
    let batch_size = opts.batch_size.max(1);
    queries
        .par_chunks(batch_size)
        .flat_map_iter(|chunk| {
            chunk
                .iter()
                .map(|query| rerank_one(documents, stored_queries, edges, analyzer, query, opts))
        })
        .collect()
}

fn rerank_one(
    documents: &Schema,
    stored_queries: &Schema,
    edges: &EdgeStore,
    analyzer: &Analyzer,
    query: &str,
    opts: &GraphOptions,
) -> QueryHits {
    let exec = ExecuteOptions {
        top_k: opts.top_k,
        top_k_token: opts.top_k_token,
        batch_size: 1,
        filter: None,
        order_by: None,
        deadline: opts.deadline,
    };

    // Direct BM25 over documents, and BM25 over the stored-query texts,
    // each cut to its own top-k before the join.
    let direct = accumulate(documents, analyzer, query, &exec);
    let via_queries = accumulate(stored_queries, analyzer, query, &exec);
    let direct_top = top_n(direct.scores, opts.top_k);
    let query_top = top_n(via_queries.scores, opts.top_k);

    // final(d) = bm25(d) + Σ over matched stored queries q with an edge
    // (d, q, w): bm25_q(q) + w. Edge-only documents enter with no direct
    // contribution; dead targets are skipped.
    let mut finals: AHashMap<u32, f32> = direct_top.into_iter().collect();
    for &(query_id, query_score) in query_top.iter() {
        for &(document_id, weight) in edges.for_query(query_id) {
            if documents.documents.get(document_id).is_none() {
                continue;
            }
            *finals.entry(document_id).or_insert(0.0) += query_score + weight;
        }
    }

    let mut ranked: Vec<(u32, f32)> = finals.into_iter().collect();
    ranked.sort_unstable_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    if opts.random_tiebreak {
        shuffle_ties(&mut ranked);
    }
    ranked.truncate(opts.top_k);

    let hits: Vec<Hit> = ranked
        .into_iter()
        .filter_map(|(doc_id, score)| {
            let doc = documents.documents.get(doc_id)?;
            Some(Hit {
                doc_id,
                key: doc.external_key.clone(),
                score,
                row: doc.row.clone(),
            })
        })
        .collect();

    QueryHits {
        query: query.to_string(),
        hits,
        partial: direct.partial || via_queries.partial,
    }
}

/// Cut an accumulated score map to its n best entries, score descending
/// with doc id ascending on ties.
fn top_n(scores: AHashMap<u32, f32>, n: usize) -> Vec<(u32, f32)> {
    let mut ranked: Vec<(u32, f32)> = scores.into_iter().collect();
    ranked.sort_unstable_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked.truncate(n);
    ranked
}

/// Shuffle each run of exactly-equal scores in place, leaving the
/// between-run order untouched.
fn shuffle_ties(ranked: &mut [(u32, f32)]) {
    let mut rng = rand::thread_rng();
    let mut start = 0;
    while start < ranked.len() {
        let score = ranked[start].1;
        let mut end = start + 1;
        while end < ranked.len() && ranked[end].1 == score {
            end += 1;
        }
        if end - start > 1 {
            ranked[start..end].shuffle(&mut rng);
        }
        start = end;
    }
}
