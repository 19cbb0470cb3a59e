use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::models::Row;

/// A live document: the caller's primary key, the token count emitted by
/// the analyzer, and the user row for filtering and hydration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    pub external_key: String,
    pub length: u32,
    pub row: Row,
}

/// External key → dense doc id assignment with per-document length and row
/// storage. Doc ids are monotonically assigned and never reused, so graph
/// edges stay valid across deletes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentStore {
    by_key: AHashMap<String, u32>,
    docs: AHashMap<u32, StoredDocument>,
    next_doc_id: u32,
}

/// Result of a create attempt: a fresh id, or the id already bound to the
/// key (the caller decides whether that is a skip or an update).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Created {
    Fresh(u32),
    Existing(u32),
}

impl DocumentStore {
    pub fn create(&mut self, external_key: &str, length: u32, row: Row) -> Created {
        if let Some(&doc_id) = self.by_key.get(external_key) {
            return Created::Existing(doc_id);
        }
        let doc_id = self.next_doc_id;
        self.next_doc_id += 1;
        self.by_key.insert(external_key.to_string(), doc_id);
        self.docs.insert(
            doc_id,
            StoredDocument {
                external_key: external_key.to_string(),
                length,
                row,
            },
        );
        Created::Fresh(doc_id)
    }

    /// Remove a document, freeing its external key. The doc id is retired,
    /// not recycled.
    pub fn delete(&mut self, doc_id: u32) -> Option<StoredDocument> {
        let doc = self.docs.remove(&doc_id)?;
        self.by_key.remove(&doc.external_key);
        Some(doc)
    }

    pub fn get(&self, doc_id: u32) -> Option<&StoredDocument> {
        self.docs.get(&doc_id)
    }

    pub fn get_length(&self, doc_id: u32) -> Option<u32> {
        self.docs.get(&doc_id).map(|d| d.length)
    }

    pub fn contains_key(&self, external_key: &str) -> bool {
        self.by_key.contains_key(external_key)
    }

    pub fn id_for_key(&self, external_key: &str) -> Option<u32> {
        self.by_key.get(external_key).copied()
    }

    /// Resolve a set of external keys; unknown keys are silently dropped.
    pub fn list_by_keys<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> Vec<u32> {
        keys.into_iter()
            .filter_map(|k| self.by_key.get(k).copied())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &StoredDocument)> {
        self.docs.iter().map(|(&id, doc)| (id, doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> Row {
        Row::new()
    }

    #[test]
    fn duplicate_keys_return_the_existing_id() {
        let mut store = DocumentStore::default();
        let a = store.create("a", 3, row());
        assert_eq!(a, Created::Fresh(0));
        assert_eq!(store.create("a", 5, row()), Created::Existing(0));
        // the original row and length are untouched
        assert_eq!(store.get_length(0), Some(3));
    }

    #[test]
    fn deleted_ids_are_not_reused() {
        let mut store = DocumentStore::default();
        store.create("a", 1, row());
        store.create("b", 1, row());
        assert!(store.delete(0).is_some());
        assert!(!store.contains_key("a"));
        // the key is free again but the id moves on
        assert_eq!(store.create("a", 1, row()), Created::Fresh(2));
    }

    #[test]
    fn list_by_keys_drops_unknowns() {
        let mut store = DocumentStore::default();
        store.create("a", 1, row());
        store.create("b", 1, row());
        let ids = store.list_by_keys(["b", "missing", "a"]);
        assert_eq!(ids, vec![1, 0]);
    }

    #[test]
    fn delete_of_unknown_id_is_none() {
        let mut store = DocumentStore::default();
        assert!(store.delete(7).is_none());
    }
}
