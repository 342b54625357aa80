//! In-memory vector index with keyword-gated nearest-neighbour retrieval.
//!
//! Texts are embedded and keyword-tagged by pluggable collaborators, stored
//! in an [`IndexStore`], and queried by brute-force top-k similarity,
//! optionally restricted to records carrying one of a set of keywords.
//!
//! # Main types
//!
//! - [`VectorDatabase`] — Store plus collaborators; builds and queries the index.
//! - [`IndexStore`] — Key → [`Record`] mapping.
//! - [`search`] — Top-k search over a store with a [`Scorer`] and optional [`KeywordFilter`].
//! - [`EmbeddingProvider`] / [`LocalEmbedding`] — Embedding service trait and local implementation.
//! - [`KeywordExtractor`] / [`EmbeddingKeywordExtractor`] — Keyword service trait and local implementation.
//! - [`IndexConfig`] — TOML-loadable settings.

/// Content-addressed cache of embeddings and keywords.
pub mod cache;
/// Index configuration.
pub mod config;
/// Embedding provider trait and local implementation.
pub mod embedding;
/// Search and batch build.
pub mod engine;
/// Keyword extractor trait and local implementation.
pub mod keywords;
/// Scoring functions.
pub mod similarity;
/// Key-to-record store.
pub mod store;

pub use cache::{CachedArtifacts, ContentCache};
pub use config::IndexConfig;
pub use embedding::{is_degenerate, EmbeddingProvider, LocalEmbedding};
pub use engine::{search, KeywordFilter, SearchHit, SearchOutput, VectorDatabase};
pub use keywords::{EmbeddingKeywordExtractor, KeywordConfig, KeywordExtractor, StopWords};
pub use kwrag_core::{IndexError, IndexResult};
pub use similarity::{cosine_similarity, dot_product, magnitude, negative_euclidean, Metric, Scorer};
pub use store::{IndexStore, Record};
