//! Ranking quality metrics: precision@k, recall@k, and NDCG@k averaged
//! over a query set against graded relevance judgments.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Relevance judgments: query id → document key → graded relevance.
/// Grades of zero count as non-relevant.
pub type Qrels = AHashMap<String, AHashMap<String, f32>>;

/// One system ranking: the query id and its retrieved keys, best first.
pub type Run = Vec<(String, Vec<String>)>;

/// Metric name (`ndcg@10`, `precision@5`, …) → mean value over the queries
/// that have at least one judgment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvalReport {
    pub metrics: BTreeMap<String, f32>,
    pub queries_evaluated: usize,
}

/// Evaluate a run against judgments at the given cutoffs. Queries with no
/// judged documents are left out of the averages.
pub fn evaluate(run: &Run, qrels: &Qrels, ks: &[usize]) -> EvalReport {
    let judged: Vec<(&Vec<String>, &AHashMap<String, f32>)> = run
        .iter()
        .filter_map(|(query_id, ranked)| {
            let rels = qrels.get(query_id)?;
            if rels.values().any(|&r| r > 0.0) {
                Some((ranked, rels))
            } else {
                None
            }
        })
        .collect();

    let mut metrics = BTreeMap::new();
    if judged.is_empty() {
        return EvalReport {
            metrics,
            queries_evaluated: 0,
        };
    }

    for &k in ks {
        let mut precision = 0.0;
        let mut recall = 0.0;
        let mut ndcg = 0.0;
        for (ranked, rels) in &judged {
            precision += precision_at_k(ranked, rels, k);
            recall += recall_at_k(ranked, rels, k);
            ndcg += ndcg_at_k(ranked, rels, k);
        }
        let n = judged.len() as f32;
        metrics.insert(format!("precision@{k}"), precision / n);
        metrics.insert(format!("recall@{k}"), recall / n);
        metrics.insert(format!("ndcg@{k}"), ndcg / n);
    }

    EvalReport {
        metrics,
        queries_evaluated: judged.len(),
    }
}

fn is_relevant(rels: &AHashMap<String, f32>, key: &str) -> bool {
    rels.get(key).is_some_and(|&r| r > 0.0)
}

pub fn precision_at_k(ranked: &[String], rels: &AHashMap<String, f32>, k: usize) -> f32 {
    if k == 0 {
        return 0.0;
    }
    let hits = ranked
        .iter()
        .take(k)
        .filter(|key| is_relevant(rels, key))
        .count();
    hits as f32 / k as f32
}

pub fn recall_at_k(ranked: &[String], rels: &AHashMap<String, f32>, k: usize) -> f32 {
    let total_relevant = rels.values().filter(|&&r| r > 0.0).count();
    if total_relevant == 0 {
        return 0.0;
    }
    let hits = ranked
        .iter()
        .take(k)
        .filter(|key| is_relevant(rels, key))
        .count();
    hits as f32 / total_relevant as f32
}

/// NDCG with the exponential gain `(2^rel - 1) / log2(rank + 1)`.
pub fn ndcg_at_k(ranked: &[String], rels: &AHashMap<String, f32>, k: usize) -> f32 {
    let dcg: f32 = ranked
        .iter()
        .take(k)
        .enumerate()
        .map(|(i, key)| {
            let rel = rels.get(key).copied().unwrap_or(0.0);
            (2f32.powf(rel) - 1.0) / ((i + 2) as f32).log2()
        })
        .sum();

    let mut ideal: Vec<f32> = rels.values().copied().filter(|&r| r > 0.0).collect();
    ideal.sort_unstable_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let idcg: f32 = ideal
        .iter()
        .take(k)
        .enumerate()
        .map(|(i, rel)| (2f32.powf(*rel) - 1.0) / ((i + 2) as f32).log2())
        .sum();

    if idcg > 0.0 {
        dcg / idcg
    } else {
        0.0
    }
}
