use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures_util::stream::{self, StreamExt, TryStreamExt};
use kwrag_core::{IndexError, IndexResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{CachedArtifacts, ContentCache};
use crate::config::IndexConfig;
use crate::embedding::{is_degenerate, EmbeddingProvider, LocalEmbedding};
use crate::keywords::{EmbeddingKeywordExtractor, KeywordConfig, KeywordExtractor};
use crate::similarity::Scorer;
use crate::store::{IndexStore, Record};

/// Any-of keyword gate applied before scoring.
///
/// A record passes when at least one term is an element of its keyword list.
/// Matching is exact and case-sensitive: `"Kittens"` does not match an
/// extracted `"kittens"`. An empty filter lets every record through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordFilter {
    terms: Vec<String>,
}

impl KeywordFilter {
    /// Filter passing records that carry at least one of `terms`.
    pub fn any_of<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            terms: terms.into_iter().map(Into::into).collect(),
        }
    }

    /// Filter terms as given.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Whether the filter has no terms.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Whether `keywords` contains at least one filter term.
    pub fn matches(&self, keywords: &[String]) -> bool {
        self.terms.iter().any(|t| keywords.contains(t))
    }
}

impl<S: Into<String>> FromIterator<S> for KeywordFilter {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::any_of(iter)
    }
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Key of the matched record.
    pub key: String,
    /// Score from the scorer; higher is more similar.
    pub score: f32,
}

/// Result of [`VectorDatabase::search_by_text`].
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutput {
    /// Keys with their scores, best first.
    Scored(Vec<SearchHit>),
    /// Keys only, best first.
    Keys(Vec<String>),
}

impl SearchOutput {
    /// Number of results.
    pub fn len(&self) -> usize {
        match self {
            SearchOutput::Scored(hits) => hits.len(),
            SearchOutput::Keys(keys) => keys.len(),
        }
    }

    /// Whether there are no results.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ranked keys, regardless of variant.
    pub fn keys(&self) -> Vec<&str> {
        match self {
            SearchOutput::Scored(hits) => hits.iter().map(|h| h.key.as_str()).collect(),
            SearchOutput::Keys(keys) => keys.iter().map(String::as_str).collect(),
        }
    }
}

/// Brute-force top-k search over `store`.
///
/// Records failing `keyword_filter` are skipped, survivors are scored with
/// `scorer(query, embedding)` and sorted by descending score. Equal scores
/// keep store order. Returns at most `k` hits; `k == 0`, an empty store or
/// a filter matching nothing all yield an empty list.
///
/// A query whose dimensionality differs from the store's, or any scorer
/// error, aborts the whole call.
pub fn search(
    store: &IndexStore,
    query: &[f32],
    k: usize,
    scorer: &dyn Scorer,
    keyword_filter: Option<&KeywordFilter>,
) -> IndexResult<Vec<SearchHit>> {
    if k == 0 || store.is_empty() {
        return Ok(Vec::new());
    }
    if let Some(dim) = store.dimension() {
        if query.len() != dim {
            return Err(IndexError::InvalidVector(format!(
                "query has {} dimensions, store holds {dim}",
                query.len()
            )));
        }
    }

    let filter = keyword_filter.filter(|f| !f.is_empty());
    let mut hits = Vec::new();
    let mut filtered_out = 0usize;
    for (key, record) in store.iter() {
        if let Some(f) = filter {
            if !f.matches(&record.keywords) {
                filtered_out += 1;
                continue;
            }
        }
        let score = scorer.score(query, &record.embedding)?;
        hits.push(SearchHit {
            key: key.to_string(),
            score,
        });
    }

    // Stable: ties keep store order.
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(k);

    debug!(
        candidates = store.len(),
        filtered_out,
        returned = hits.len(),
        "Search completed"
    );
    Ok(hits)
}

/// Where a build entry gets its embedding and keywords from.
enum Source {
    /// Index into this build's service results.
    Fresh(usize),
    /// Digest of a content-cache entry.
    Cached(String),
}

/// An [`IndexStore`] together with the services that populate it.
pub struct VectorDatabase {
    store: IndexStore,
    embedder: Arc<dyn EmbeddingProvider>,
    extractor: Arc<dyn KeywordExtractor>,
    config: IndexConfig,
    cache: ContentCache,
}

impl VectorDatabase {
    /// Create an empty database with the default [`IndexConfig`].
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, extractor: Arc<dyn KeywordExtractor>) -> Self {
        Self {
            store: IndexStore::new(),
            embedder,
            extractor,
            config: IndexConfig::default(),
            cache: ContentCache::new(),
        }
    }

    /// Database backed by [`LocalEmbedding`] and an [`EmbeddingKeywordExtractor`]
    /// sharing it.
    pub fn local(dimension: usize) -> Self {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(LocalEmbedding::new(dimension));
        let extractor = Arc::new(EmbeddingKeywordExtractor::new(Arc::clone(&embedder)));
        Self::new(embedder, extractor)
    }

    /// Replace the configuration. Chainable builder method.
    pub fn with_config(mut self, config: IndexConfig) -> IndexResult<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Active configuration.
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Underlying store, for read-only access.
    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Insert a precomputed record directly.
    pub fn insert(&mut self, key: impl Into<String>, record: Record) -> IndexResult<Option<Record>> {
        self.store.insert(key, record)
    }

    /// Keys whose embedding is the all-zero vector, in store order.
    ///
    /// Cosine search fails with [`IndexError::InvalidVector`] when it scores
    /// one of these records, so they need a keyword filter that excludes them
    /// or a different [`Metric`](crate::Metric).
    pub fn degenerate_keys(&self) -> Vec<&str> {
        self.store
            .iter()
            .filter(|(_, r)| is_degenerate(&r.embedding))
            .map(|(k, _)| k)
            .collect()
    }

    /// Embedding stored under `key`, or `None`.
    pub fn retrieve_embedding(&self, key: &str) -> Option<&[f32]> {
        self.store.retrieve_embedding(key)
    }

    /// See [`search`].
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        scorer: &dyn Scorer,
        keyword_filter: Option<&KeywordFilter>,
    ) -> IndexResult<Vec<SearchHit>> {
        search(&self.store, query, k, scorer, keyword_filter)
    }

    /// [`search`] scored with the configured [`Metric`](crate::Metric).
    pub fn search_with_default_metric(
        &self,
        query: &[f32],
        k: usize,
        keyword_filter: Option<&KeywordFilter>,
    ) -> IndexResult<Vec<SearchHit>> {
        search(&self.store, query, k, &self.config.metric, keyword_filter)
    }

    /// Embed `query_text`, then [`search`] with it.
    ///
    /// With `return_as_text` the scores are dropped and only the ranked keys
    /// are returned.
    pub async fn search_by_text(
        &self,
        query_text: &str,
        k: usize,
        scorer: &dyn Scorer,
        return_as_text: bool,
        keyword_filter: Option<&KeywordFilter>,
    ) -> IndexResult<SearchOutput> {
        let query = self.embedder.embed(query_text).await?;
        let hits = self.search(&query, k, scorer, keyword_filter)?;
        if return_as_text {
            Ok(SearchOutput::Keys(hits.into_iter().map(|h| h.key).collect()))
        } else {
            Ok(SearchOutput::Scored(hits))
        }
    }

    /// Index every text under itself as key.
    ///
    /// Identical texts collapse into one record. Empty texts are rejected
    /// with [`IndexError::InvalidKey`] before any service call: a store key may
    /// not be empty, which overrides accepting `""` as a degenerate text.
    /// Texts with no usable tokens (whitespace, punctuation) are accepted; see
    /// [`degenerate_keys`](Self::degenerate_keys).
    pub async fn build_from_list<S: AsRef<str>>(&mut self, texts: &[S]) -> IndexResult<&IndexStore> {
        let entries = texts
            .iter()
            .map(|t| (t.as_ref().to_string(), t.as_ref().to_string()))
            .collect();
        self.build(entries).await
    }

    /// Index `(key, text)` pairs under caller-supplied keys.
    pub async fn build_from_pairs<K, T>(&mut self, pairs: Vec<(K, T)>) -> IndexResult<&IndexStore>
    where
        K: Into<String>,
        T: Into<String>,
    {
        let entries = pairs
            .into_iter()
            .map(|(k, t)| (k.into(), t.into()))
            .collect();
        self.build(entries).await
    }

    /// Embeds the batch in one call, extracts keywords per text, then commits.
    ///
    /// Records are assembled in a scratch store and merged only once every
    /// service call has succeeded, so a failed or cancelled build leaves the
    /// database unchanged.
    async fn build(&mut self, entries: Vec<(String, String)>) -> IndexResult<&IndexStore> {
        let started = Instant::now();
        if let Some(pos) = entries.iter().position(|(k, _)| k.is_empty()) {
            return Err(IndexError::InvalidKey(format!(
                "entry {pos} has an empty key"
            )));
        }
        info!(items = entries.len(), "Building index");

        let mut work: Vec<&str> = Vec::new();
        let mut work_digests: Vec<Option<String>> = Vec::new();
        let mut sources: Vec<Source> = Vec::with_capacity(entries.len());
        if self.config.content_cache {
            let mut queued: HashMap<String, usize> = HashMap::new();
            for (_, text) in &entries {
                let digest = ContentCache::digest(text);
                if self.cache.get_digest(&digest).is_some() {
                    sources.push(Source::Cached(digest));
                } else if let Some(&j) = queued.get(&digest) {
                    sources.push(Source::Fresh(j));
                } else {
                    queued.insert(digest.clone(), work.len());
                    sources.push(Source::Fresh(work.len()));
                    work.push(text);
                    work_digests.push(Some(digest));
                }
            }
        } else {
            for (i, (_, text)) in entries.iter().enumerate() {
                sources.push(Source::Fresh(i));
                work.push(text);
                work_digests.push(None);
            }
        }

        let embeddings = if work.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed_batch(&work).await?
        };
        if embeddings.len() != work.len() {
            return Err(IndexError::Embedding(format!(
                "expected {} embeddings, got {}",
                work.len(),
                embeddings.len()
            )));
        }
        if let Some(first) = embeddings.first() {
            if let Some(bad) = embeddings.iter().position(|e| e.len() != first.len()) {
                return Err(IndexError::Embedding(format!(
                    "embedding {bad} has {} dimensions, expected {}",
                    embeddings[bad].len(),
                    first.len()
                )));
            }
        }

        let extractor = self.extractor.as_ref();
        let kw_config = &self.config.keywords;
        let best_effort = self.config.keyword_best_effort;
        let keywords: Vec<Vec<String>> = stream::iter(work.iter().copied())
            .map(|text| extract_keywords(extractor, text, kw_config, best_effort))
            .buffered(self.config.keyword_concurrency)
            .try_collect()
            .await?;

        let fresh: Vec<CachedArtifacts> = embeddings
            .into_iter()
            .zip(keywords)
            .map(|(embedding, keywords)| CachedArtifacts { embedding, keywords })
            .collect();

        let mut scratch = IndexStore::new();
        let mut degenerate = 0usize;
        for ((key, text), source) in entries.iter().zip(&sources) {
            let artifacts = match source {
                Source::Fresh(j) => &fresh[*j],
                Source::Cached(digest) => self.cache.get_digest(digest).ok_or_else(|| {
                    IndexError::Embedding(format!("content cache lost entry {digest}"))
                })?,
            };
            let record = Record::new(
                artifacts.embedding.clone(),
                artifacts.keywords.clone(),
                text.clone(),
            );
            if is_degenerate(&record.embedding) {
                degenerate += 1;
            }
            scratch.insert(key.clone(), record)?;
        }
        if degenerate > 0 {
            warn!(
                degenerate,
                "Build stores zero-norm embeddings; cosine search over them will fail"
            );
        }

        self.store.merge(scratch)?;
        if self.config.content_cache {
            for (digest, artifacts) in work_digests.into_iter().zip(fresh) {
                if let Some(digest) = digest {
                    self.cache.insert_digest(digest, artifacts);
                }
            }
        }

        info!(
            items = entries.len(),
            computed = work.len(),
            records = self.store.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Index build completed"
        );
        Ok(&self.store)
    }
}

async fn extract_keywords(
    extractor: &dyn KeywordExtractor,
    text: &str,
    config: &KeywordConfig,
    best_effort: bool,
) -> IndexResult<Vec<String>> {
    match extractor.extract(text, config).await {
        Ok(keywords) => Ok(keywords),
        Err(e) if best_effort => {
            warn!(error = %e, text_len = text.len(), "Keyword extraction failed, using no keywords");
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}
