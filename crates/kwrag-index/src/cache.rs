use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Embedding and keywords computed for one text.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedArtifacts {
    /// Embedding returned by the embedding service.
    pub embedding: Vec<f32>,
    /// Keywords returned by the keyword service.
    pub keywords: Vec<String>,
}

/// Content-addressed cache of service results, keyed by the SHA-256 of the text.
///
/// Only deduplicates work: record identity stays with the caller's key.
#[derive(Debug, Clone, Default)]
pub struct ContentCache {
    entries: HashMap<String, CachedArtifacts>,
}

impl ContentCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hex-encoded SHA-256 digest of `text`.
    pub fn digest(text: &str) -> String {
        hex::encode(Sha256::digest(text.as_bytes()))
    }

    /// Artifacts cached for `text`.
    pub fn get(&self, text: &str) -> Option<&CachedArtifacts> {
        self.entries.get(&Self::digest(text))
    }

    /// Artifacts cached under a precomputed digest.
    pub fn get_digest(&self, digest: &str) -> Option<&CachedArtifacts> {
        self.entries.get(digest)
    }

    /// Store artifacts under a precomputed digest.
    pub fn insert_digest(&mut self, digest: String, artifacts: CachedArtifacts) {
        self.entries.insert(digest, artifacts);
    }

    /// Number of cached texts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
