use async_trait::async_trait;
use kwrag_core::IndexResult;
use std::collections::BTreeMap;

use crate::keywords::tokenize;
use crate::similarity::magnitude;

/// Embedding service used to vectorise corpus texts and queries.
///
/// Every vector a provider returns has [`dimension`](Self::dimension)
/// components. A text with no usable content may embed to the all-zero
/// vector; such a vector is still a valid result and keeps its position in
/// a batch, but it cannot be scored with cosine similarity.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Vector for a single text.
    async fn embed(&self, text: &str) -> IndexResult<Vec<f32>>;

    /// Vectors for `texts`, one per input and in input order.
    ///
    /// The default issues one [`embed`](Self::embed) per text. Remote
    /// providers should override it with a single round trip.
    async fn embed_batch(&self, texts: &[&str]) -> IndexResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Number of components in every returned vector.
    fn dimension(&self) -> usize;
}

/// Whether `vector` is the all-zero embedding of a content-free text.
pub fn is_degenerate(vector: &[f32]) -> bool {
    magnitude(vector) == 0.0
}

/// Offline provider based on signed feature hashing.
///
/// Each token is hashed to a slot and a sign, weighted by `1 + ln(tf)`, and
/// the vector is scaled to unit length. Token order and case do not matter.
/// Texts without tokens (empty, whitespace, punctuation, single letters)
/// embed to the all-zero vector.
#[derive(Debug, Clone)]
pub struct LocalEmbedding {
    dimension: usize,
}

impl LocalEmbedding {
    /// Provider producing `dimension`-component vectors.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn vectorise(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        if self.dimension == 0 {
            return vector;
        }

        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        for token in tokenize(text) {
            *counts.entry(token).or_insert(0) += 1;
        }
        for (token, tf) in &counts {
            let hash = fnv1a64(token.as_bytes());
            let slot = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[slot] += sign * (1.0 + (*tf as f32).ln());
        }

        let norm = magnitude(&vector);
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

impl Default for LocalEmbedding {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedding {
    async fn embed(&self, text: &str) -> IndexResult<Vec<f32>> {
        Ok(self.vectorise(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> IndexResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vectorise(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn fnv1a64(data: &[u8]) -> u64 {
    data.iter().fold(0xcbf2_9ce4_8422_2325, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}
