use serde_json::json;

use crate::analysis::{Analyzer, AnalyzerSettings};
use crate::models::{DocumentRecord, Row};

use super::indexer::{ingest, IngestOptions};
use super::scores::Bm25Params;
use super::{delete_by_keys, Schema};

fn analyzer() -> Analyzer {
    Analyzer::compile(&AnalyzerSettings::default()).unwrap()
}

fn record(key: &str, text: &str) -> DocumentRecord {
    let mut row = Row::new();
    row.insert("id".to_string(), json!(key));
    row.insert("text".to_string(), json!(text));
    DocumentRecord {
        key: key.to_string(),
        row,
    }
}

fn text_fields() -> Vec<String> {
    vec!["text".to_string()]
}

fn opts(fields: &[String]) -> IngestOptions<'_> {
    IngestOptions {
        fields,
        batch_size: 2,
        params: Bm25Params::default(),
    }
}

fn tiny_corpus() -> (Schema, Analyzer) {
    let mut schema = Schema::default();
    let analyzer = analyzer();
    let fields = text_fields();
    let summary = ingest(
        &mut schema,
        vec![
            record("A", "the cat sat"),
            record("B", "the dog sat"),
            record("C", "cats and dogs"),
        ],
        &analyzer,
        &opts(&fields),
    );
    assert_eq!(summary.inserted, 3);
    (schema, analyzer)
}

#[test]
fn ingest_builds_a_consistent_index() {
    let (schema, analyzer) = tiny_corpus();
    schema.check_invariants().unwrap();

    assert_eq!(schema.stats.doc_count, 3);
    assert_eq!(schema.documents.get_length(0), Some(2)); // "cat sat"

    // "cat" and "cats" meet on one stemmed term present in A and C
    let cat = analyzer.analyze("cat").remove(0);
    let cat_id = schema.dictionary.lookup(&cat).unwrap();
    assert_eq!(schema.dictionary.df(cat_id), 2);
    let entry = schema.scores.entry(cat_id).unwrap();
    assert_eq!(entry.docs.len(), 2);
}

#[test]
fn ingest_is_idempotent() {
    let (mut schema, analyzer) = tiny_corpus();
    let before = serde_json::to_string(&schema).unwrap();

    let fields = text_fields();
    let summary = ingest(
        &mut schema,
        vec![
            record("A", "the cat sat"),
            record("B", "the dog sat"),
            record("C", "cats and dogs"),
        ],
        &analyzer,
        &opts(&fields),
    );
    assert_eq!(summary.inserted, 0);
    assert_eq!(summary.skipped, 3);
    assert_eq!(serde_json::to_string(&schema).unwrap(), before);
}

#[test]
fn duplicate_keys_within_one_call_are_skipped() {
    let mut schema = Schema::default();
    let analyzer = analyzer();
    let fields = text_fields();
    let summary = ingest(
        &mut schema,
        vec![record("A", "first version"), record("A", "second version")],
        &analyzer,
        &opts(&fields),
    );
    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.skipped, 1);
    schema.check_invariants().unwrap();
}

#[test]
fn empty_key_fails_that_record_only() {
    let mut schema = Schema::default();
    let analyzer = analyzer();
    let fields = text_fields();
    let summary = ingest(
        &mut schema,
        vec![record("", "lost"), record("A", "kept")],
        &analyzer,
        &opts(&fields),
    );
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.inserted, 1);
    assert_eq!(schema.stats.doc_count, 1);
}

#[test]
fn empty_tokenisation_is_accepted() {
    let mut schema = Schema::default();
    let analyzer = analyzer();
    let fields = text_fields();
    let summary = ingest(
        &mut schema,
        vec![record("A", "the of and"), record("B", "real signal words")],
        &analyzer,
        &opts(&fields),
    );
    assert_eq!(summary.inserted, 2);
    assert_eq!(schema.documents.get_length(0), Some(0));
    // the empty document counts toward N but not toward avgdl
    assert_eq!(schema.stats.doc_count, 2);
    assert!((schema.stats.avgdl - 3.0).abs() < 1e-6);
    schema.check_invariants().unwrap();
}

#[test]
fn missing_indexed_field_contributes_nothing() {
    let mut schema = Schema::default();
    let analyzer = analyzer();
    let fields = vec!["text".to_string(), "title".to_string()];
    let mut row = Row::new();
    row.insert("title".to_string(), json!("Midnight Library"));
    let summary = ingest(
        &mut schema,
        vec![DocumentRecord {
            key: "A".to_string(),
            row,
        }],
        &analyzer,
        &opts(&fields),
    );
    assert_eq!(summary.inserted, 1);
    assert_eq!(schema.documents.get_length(0), Some(2));
}

#[test]
fn delete_repairs_df_and_scores() {
    let (mut schema, analyzer) = tiny_corpus();

    let summary = delete_by_keys(&mut schema, &["A".to_string()], Bm25Params::default());
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.missing, 0);
    schema.check_invariants().unwrap();

    let cat = analyzer.analyze("cat").remove(0);
    let cat_id = schema.dictionary.lookup(&cat).unwrap();
    assert_eq!(schema.dictionary.df(cat_id), 1);
    let entry = schema.scores.entry(cat_id).unwrap();
    assert_eq!(entry.docs, vec![2]); // only C remains
    assert_eq!(schema.stats.doc_count, 2);
}

#[test]
fn delete_of_unknown_keys_is_a_noop() {
    let (mut schema, _) = tiny_corpus();
    let before = serde_json::to_string(&schema).unwrap();
    let summary = delete_by_keys(&mut schema, &["nope".to_string()], Bm25Params::default());
    assert_eq!(summary.deleted, 0);
    assert_eq!(summary.missing, 1);
    assert_eq!(serde_json::to_string(&schema).unwrap(), before);
}

#[test]
fn delete_then_reinsert_restores_the_ranking() {
    let (mut schema, analyzer) = tiny_corpus();
    let cat = analyzer.analyze("cat").remove(0);
    let cat_id = schema.dictionary.lookup(&cat).unwrap();
    let before: Vec<String> = schema
        .scores
        .entry(cat_id)
        .unwrap()
        .docs
        .iter()
        .map(|&d| schema.documents.get(d).unwrap().external_key.clone())
        .collect();

    delete_by_keys(
        &mut schema,
        &["A".to_string(), "C".to_string()],
        Bm25Params::default(),
    );
    let fields = text_fields();
    ingest(
        &mut schema,
        vec![record("A", "the cat sat"), record("C", "cats and dogs")],
        &analyzer,
        &opts(&fields),
    );
    schema.check_invariants().unwrap();

    let after: Vec<String> = schema
        .scores
        .entry(cat_id)
        .unwrap()
        .docs
        .iter()
        .map(|&d| schema.documents.get(d).unwrap().external_key.clone())
        .collect();
    assert_eq!(before, after);
}

#[test]
fn term_ids_survive_total_deletion() {
    let (mut schema, analyzer) = tiny_corpus();
    let sat = analyzer.analyze("sat").remove(0);
    let sat_id = schema.dictionary.lookup(&sat).unwrap();

    delete_by_keys(
        &mut schema,
        &["A".to_string(), "B".to_string(), "C".to_string()],
        Bm25Params::default(),
    );
    schema.check_invariants().unwrap();

    assert_eq!(schema.stats.doc_count, 0);
    assert_eq!(schema.dictionary.df(sat_id), 0);
    assert!(schema.scores.entry(sat_id).is_none());
    // ids are stable: interning the surface again yields the same id
    assert_eq!(schema.dictionary.lookup(&sat), Some(sat_id));
}
