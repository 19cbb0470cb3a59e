use serde_json::json;
use std::time::{Duration, Instant};

use crate::analysis::{Analyzer, AnalyzerSettings};
use crate::index::{ingest, Bm25Params, IngestOptions, Schema};
use crate::models::{DocumentRecord, Row};

use super::executor::{execute_batch, execute_one, ExecuteOptions};
use super::filters::{parse_filter, parse_order_by};

fn analyzer() -> Analyzer {
    Analyzer::compile(&AnalyzerSettings::default()).unwrap()
}

fn record(key: &str, pairs: &[(&str, serde_json::Value)]) -> DocumentRecord {
    let mut row = Row::new();
    for (k, v) in pairs {
        row.insert(k.to_string(), v.clone());
    }
    DocumentRecord {
        key: key.to_string(),
        row,
    }
}

fn build(records: Vec<DocumentRecord>, fields: &[&str]) -> (Schema, Analyzer) {
    let mut schema = Schema::default();
    let analyzer = analyzer();
    let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
    ingest(
        &mut schema,
        records,
        &analyzer,
        &IngestOptions {
            fields: &fields,
            batch_size: 64,
            params: Bm25Params::default(),
        },
    );
    (schema, analyzer)
}

fn defaults() -> ExecuteOptions<'static> {
    ExecuteOptions {
        top_k: 10,
        top_k_token: 100,
        batch_size: 8,
        filter: None,
        order_by: None,
        deadline: None,
    }
}

fn tiny() -> (Schema, Analyzer) {
    build(
        vec![
            record("A", &[("text", json!("the cat sat"))]),
            record("B", &[("text", json!("the dog sat"))]),
            record("C", &[("text", json!("cats and dogs"))]),
        ],
        &["text"],
    )
}

#[test]
fn ranks_matching_documents_only() {
    let (schema, analyzer) = tiny();
    let opts = ExecuteOptions {
        top_k: 2,
        top_k_token: 10,
        ..defaults()
    };
    let out = execute_one(&schema, &analyzer, "cat", &opts);
    let keys: Vec<&str> = out.hits.iter().map(|h| h.key.as_str()).collect();
    assert_eq!(keys, vec!["A", "C"]);
    assert!(!out.partial);
}

#[test]
fn empty_corpus_and_unknown_terms_return_empty() {
    let (schema, analyzer) = build(vec![], &["text"]);
    let out = execute_one(&schema, &analyzer, "anything", &defaults());
    assert!(out.hits.is_empty());

    let (schema, analyzer) = tiny();
    let out = execute_one(&schema, &analyzer, "zebra unicorn", &defaults());
    assert!(out.hits.is_empty());
}

#[test]
fn stop_word_only_query_is_empty() {
    let (schema, analyzer) = tiny();
    let out = execute_one(&schema, &analyzer, "the of and", &defaults());
    assert!(out.hits.is_empty());
}

#[test]
fn top_k_larger_than_candidates_returns_all() {
    let (schema, analyzer) = tiny();
    let opts = ExecuteOptions {
        top_k: 50,
        ..defaults()
    };
    let out = execute_one(&schema, &analyzer, "sat", &opts);
    assert_eq!(out.hits.len(), 2);
}

#[test]
fn truncated_slices_bound_the_candidates() {
    // two terms whose top-1 postings are disjoint documents
    let (schema, analyzer) = build(
        vec![
            record("A", &[("text", json!("alpha alpha alpha"))]),
            record("B", &[("text", json!("beta beta beta"))]),
            record("C", &[("text", json!("alpha beta filler words"))]),
        ],
        &["text"],
    );
    let opts = ExecuteOptions {
        top_k_token: 1,
        ..defaults()
    };
    let out = execute_one(&schema, &analyzer, "alpha beta", &opts);
    let keys: Vec<&str> = out.hits.iter().map(|h| h.key.as_str()).collect();
    // each term contributes only its single best posting
    assert_eq!(keys.len(), 2);
    assert!(keys.contains(&"A") && keys.contains(&"B"));
}

#[test]
fn raising_top_k_token_never_loses_results() {
    let (schema, analyzer) = build(
        vec![
            record("A", &[("text", json!("alpha alpha alpha"))]),
            record("B", &[("text", json!("beta beta beta"))]),
            record("C", &[("text", json!("alpha beta filler words"))]),
        ],
        &["text"],
    );
    let narrow = execute_one(
        &schema,
        &analyzer,
        "alpha beta",
        &ExecuteOptions {
            top_k_token: 1,
            ..defaults()
        },
    );
    let wide = execute_one(
        &schema,
        &analyzer,
        "alpha beta",
        &ExecuteOptions {
            top_k_token: 100,
            ..defaults()
        },
    );
    let narrow_keys: Vec<&str> = narrow.hits.iter().map(|h| h.key.as_str()).collect();
    let wide_keys: Vec<&str> = wide.hits.iter().map(|h| h.key.as_str()).collect();
    for key in &narrow_keys {
        assert!(wide_keys.contains(key));
    }
    assert_eq!(wide_keys.len(), 3);
}

#[test]
fn repeated_query_terms_accumulate() {
    let (schema, analyzer) = tiny();
    let once = execute_one(&schema, &analyzer, "cat", &defaults());
    let twice = execute_one(&schema, &analyzer, "cat cat", &defaults());
    assert!((twice.hits[0].score - 2.0 * once.hits[0].score).abs() < 1e-6);
}

#[test]
fn filters_prune_candidates() {
    let (schema, analyzer) = build(
        vec![
            record(
                "woodstock",
                &[
                    ("text", json!("classic rock festival")),
                    ("year", json!(1969)),
                    ("popularity", json!(10)),
                ],
            ),
            record(
                "punk-wave",
                &[
                    ("text", json!("rock revolution")),
                    ("year", json!(1977)),
                    ("popularity", json!(9)),
                ],
            ),
            record(
                "revival",
                &[
                    ("text", json!("rock revival tour")),
                    ("year", json!(2007)),
                    ("popularity", json!(9)),
                ],
            ),
        ],
        &["text"],
    );
    let filter = parse_filter("year >= 1970 AND popularity > 8").unwrap();
    let opts = ExecuteOptions {
        filter: Some(&filter),
        ..defaults()
    };
    let out = execute_one(&schema, &analyzer, "rock", &opts);
    let keys: Vec<&str> = out.hits.iter().map(|h| h.key.as_str()).collect();
    assert_eq!(keys, vec!["punk-wave"]);
}

#[test]
fn order_by_reorders_the_final_page() {
    let (schema, analyzer) = build(
        vec![
            record("A", &[("text", json!("rock")), ("year", json!(1999))]),
            record("B", &[("text", json!("rock")), ("year", json!(1969))]),
            record("C", &[("text", json!("rock")), ("year", json!(1985))]),
        ],
        &["text"],
    );
    let order = parse_order_by("year asc").unwrap();
    let opts = ExecuteOptions {
        order_by: Some(&order),
        ..defaults()
    };
    let out = execute_one(&schema, &analyzer, "rock", &opts);
    let years: Vec<i64> = out
        .hits
        .iter()
        .map(|h| h.row.get("year").unwrap().as_i64().unwrap())
        .collect();
    assert_eq!(years, vec![1969, 1985, 1999]);
}

#[test]
fn expired_deadline_flags_partial() {
    let (schema, analyzer) = tiny();
    let opts = ExecuteOptions {
        deadline: Some(Instant::now() - Duration::from_millis(1)),
        ..defaults()
    };
    let out = execute_one(&schema, &analyzer, "cat", &opts);
    assert!(out.partial);
    assert!(out.hits.is_empty());
}

#[test]
fn batches_preserve_input_order() {
    let (schema, analyzer) = tiny();
    let queries = vec![
        "cat".to_string(),
        "dog".to_string(),
        "zebra".to_string(),
        "sat".to_string(),
    ];
    let opts = ExecuteOptions {
        batch_size: 2,
        ..defaults()
    };
    let out = execute_batch(&schema, &analyzer, &queries, &opts);
    assert_eq!(out.len(), 4);
    for (result, query) in out.iter().zip(&queries) {
        assert_eq!(&result.query, query);
    }
    assert!(out[2].hits.is_empty());
    assert!(!out[3].hits.is_empty());
}
