use kwrag_core::{IndexError, IndexResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single entry stored in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Embedding vector; same dimensionality for every record in a store.
    pub embedding: Vec<f32>,
    /// Extracted keywords, best first. May be empty; duplicates are kept.
    pub keywords: Vec<String>,
    /// Source text the record was built from.
    pub text: String,
}

impl Record {
    /// Creates a new record.
    pub fn new(embedding: Vec<f32>, keywords: Vec<String>, text: impl Into<String>) -> Self {
        Self {
            embedding,
            keywords,
            text: text.into(),
        }
    }
}

/// Key → [`Record`] mapping that only grows.
///
/// Iteration follows first-insertion order. Overwriting a key replaces its
/// record in place, so the key keeps its original position. All embeddings
/// share the dimensionality fixed by the first insert.
///
/// The store performs no locking: build it, then query it. Callers that need
/// to insert while searching must synchronise externally.
#[derive(Debug, Clone, Default)]
pub struct IndexStore {
    entries: Vec<(String, Record)>,
    positions: HashMap<String, usize>,
    dimension: Option<usize>,
}

impl IndexStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the record for `key`, returning the previous record.
    ///
    /// Rejects empty keys and embeddings whose dimensionality differs from
    /// the store's.
    pub fn insert(&mut self, key: impl Into<String>, record: Record) -> IndexResult<Option<Record>> {
        let key = key.into();
        if key.is_empty() {
            return Err(IndexError::InvalidKey("record key must not be empty".to_string()));
        }
        match self.dimension {
            Some(dim) if dim != record.embedding.len() => {
                return Err(IndexError::InvalidVector(format!(
                    "record '{key}' has {} dimensions, store holds {dim}",
                    record.embedding.len()
                )));
            }
            Some(_) => {}
            None => self.dimension = Some(record.embedding.len()),
        }

        if let Some(&pos) = self.positions.get(&key) {
            let previous = std::mem::replace(&mut self.entries[pos].1, record);
            return Ok(Some(previous));
        }
        self.positions.insert(key.clone(), self.entries.len());
        self.entries.push((key, record));
        Ok(None)
    }

    /// Embedding stored under `key`, or `None` if there is no such record.
    pub fn retrieve_embedding(&self, key: &str) -> Option<&[f32]> {
        self.get(key).map(|r| r.embedding.as_slice())
    }

    /// Record stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&Record> {
        self.positions.get(key).map(|&pos| &self.entries[pos].1)
    }

    /// Whether a record is stored under `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dimensionality shared by every stored embedding, once known.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// All `(key, record)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Record)> {
        self.entries.iter().map(|(k, r)| (k.as_str(), r))
    }

    /// All keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Move every record of `other` into this store, in `other`'s order.
    ///
    /// Every record is checked before anything is written, so on error this
    /// store is unchanged.
    pub fn merge(&mut self, other: IndexStore) -> IndexResult<()> {
        if let (Some(mine), Some(theirs)) = (self.dimension, other.dimension) {
            if mine != theirs {
                return Err(IndexError::InvalidVector(format!(
                    "cannot merge {theirs}-dimensional records into a {mine}-dimensional store"
                )));
            }
        }
        for (key, record) in other.entries {
            self.insert(key, record)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn record(text: &str, embedding: Vec<f32>) -> Record {
        Record::new(embedding, vec![text.to_lowercase()], text)
    }

    #[test]
    fn test_insert_and_retrieve() {
        let mut store = IndexStore::new();
        assert!(store.is_empty());

        let prev = store.insert("a", record("alpha", vec![1.0, 0.0])).unwrap();
        assert!(prev.is_none());
        assert_eq!(store.len(), 1);
        assert_eq!(store.dimension(), Some(2));
        assert_eq!(store.retrieve_embedding("a"), Some(&[1.0, 0.0][..]));
        assert_eq!(store.get("a").unwrap().text, "alpha");
    }

    #[test]
    fn test_missing_key_is_none() {
        let store = IndexStore::new();
        assert!(store.retrieve_embedding("nope").is_none());
        assert!(store.get("nope").is_none());
        assert!(!store.contains_key("nope"));
    }

    #[test]
    fn test_overwrite_keeps_last_write_and_position() {
        let mut store = IndexStore::new();
        store.insert("a", record("first", vec![1.0, 0.0])).unwrap();
        store.insert("b", record("other", vec![0.0, 1.0])).unwrap();

        let prev = store.insert("a", record("second", vec![0.5, 0.5])).unwrap();
        assert_eq!(prev.unwrap().text, "first");
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("a").unwrap().text, "second");
        assert_eq!(store.retrieve_embedding("a"), Some(&[0.5, 0.5][..]));

        let keys: Vec<&str> = store.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_empty_key_rejected() {
        let mut store = IndexStore::new();
        let err = store.insert("", record("x", vec![1.0])).unwrap_err();
        assert!(matches!(err, IndexError::InvalidKey(_)));
        assert!(store.is_empty());
        assert_eq!(store.dimension(), None);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut store = IndexStore::new();
        store.insert("a", record("a", vec![1.0, 0.0, 0.0])).unwrap();
        let err = store.insert("b", record("b", vec![1.0, 0.0])).unwrap_err();
        assert!(matches!(err, IndexError::InvalidVector(_)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_iter_insertion_order() {
        let mut store = IndexStore::new();
        for key in ["z", "m", "a"] {
            store.insert(key, record(key, vec![1.0])).unwrap();
        }
        let keys: Vec<&str> = store.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["z", "m", "a"]);
    }

    #[test]
    fn test_merge() {
        let mut base = IndexStore::new();
        base.insert("a", record("old", vec![1.0, 0.0])).unwrap();

        let mut scratch = IndexStore::new();
        scratch.insert("b", record("b", vec![0.0, 1.0])).unwrap();
        scratch.insert("a", record("new", vec![0.7, 0.7])).unwrap();

        base.merge(scratch).unwrap();
        assert_eq!(base.len(), 2);
        assert_eq!(base.get("a").unwrap().text, "new");
    }

    #[test]
    fn test_merge_dimension_mismatch_leaves_store_untouched() {
        let mut base = IndexStore::new();
        base.insert("a", record("a", vec![1.0, 0.0])).unwrap();

        let mut scratch = IndexStore::new();
        scratch.insert("b", record("b", vec![1.0, 0.0, 0.0])).unwrap();

        assert!(base.merge(scratch).is_err());
        assert_eq!(base.len(), 1);
    }
}
