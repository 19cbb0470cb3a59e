//! Property tests for the ingest laws: double ingest is a no-op, and
//! delete-then-reinsert restores the ranking.

use proptest::collection::vec;
use proptest::prelude::*;
use serde_json::json;
use tempfile::TempDir;

use fathom_search::engine::{RuntimeOptions, SearchEngine, SearchRequest};
use fathom_search::models::{DocumentRecord, Row};

fn word() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("apple"),
        Just("banana"),
        Just("cherry"),
        Just("damson"),
        Just("elder"),
        Just("fig"),
    ]
}

fn text() -> impl Strategy<Value = String> {
    vec(word(), 0..8).prop_map(|words| words.join(" "))
}

fn corpus() -> impl Strategy<Value = Vec<(String, String)>> {
    vec(text(), 1..10).prop_map(|texts| {
        texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| (format!("doc-{i}"), text))
            .collect()
    })
}

fn records(corpus: &[(String, String)]) -> Vec<DocumentRecord> {
    corpus
        .iter()
        .map(|(key, text)| {
            let mut row = Row::new();
            row.insert("text".to_string(), json!(text));
            DocumentRecord {
                key: key.clone(),
                row,
            }
        })
        .collect()
}

fn ranking(engine: &SearchEngine, query: &str) -> Vec<String> {
    let results = engine
        .search_documents(
            &[query.to_string()],
            &SearchRequest {
                top_k: 100,
                top_k_token: 100,
                ..Default::default()
            },
        )
        .unwrap();
    results[0].hits.iter().map(|h| h.key.clone()).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn double_ingest_changes_nothing(corpus in corpus()) {
        let dir = TempDir::new().unwrap();
        let engine = SearchEngine::open(dir.path(), None, RuntimeOptions::default()).unwrap();
        let fields = vec!["text".to_string()];

        let first = engine.upload_documents(records(&corpus), &fields).unwrap();
        prop_assert_eq!(first.inserted, corpus.len());
        let rankings: Vec<Vec<String>> =
            ["apple", "banana", "fig"].iter().map(|q| ranking(&engine, q)).collect();

        let second = engine.upload_documents(records(&corpus), &fields).unwrap();
        prop_assert_eq!(second.inserted, 0);
        prop_assert_eq!(second.skipped, corpus.len());
        engine.check_invariants().unwrap();

        for (query, before) in ["apple", "banana", "fig"].iter().zip(rankings) {
            prop_assert_eq!(ranking(&engine, query), before);
        }
    }

    #[test]
    fn delete_then_reinsert_restores_rankings(corpus in corpus()) {
        let dir = TempDir::new().unwrap();
        let engine = SearchEngine::open(dir.path(), None, RuntimeOptions::default()).unwrap();
        let fields = vec!["text".to_string()];

        engine.upload_documents(records(&corpus), &fields).unwrap();
        let before: Vec<Vec<String>> =
            ["apple", "cherry", "elder"].iter().map(|q| ranking(&engine, q)).collect();

        let keys: Vec<String> = corpus.iter().map(|(key, _)| key.clone()).collect();
        let deleted = engine.delete_documents(&keys).unwrap();
        prop_assert_eq!(deleted.deleted, corpus.len());
        prop_assert!(ranking(&engine, "apple").is_empty());

        engine.upload_documents(records(&corpus), &fields).unwrap();
        engine.check_invariants().unwrap();

        for (query, expected) in ["apple", "cherry", "elder"].iter().zip(before) {
            prop_assert_eq!(ranking(&engine, query), expected);
        }
    }
}
