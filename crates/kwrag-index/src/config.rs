use kwrag_core::{IndexError, IndexResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::keywords::KeywordConfig;
use crate::similarity::Metric;

/// Settings for a [`VectorDatabase`](crate::VectorDatabase).
///
/// Every field has a default, so an empty TOML document is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Metric used by [`VectorDatabase::search_with_default_metric`](crate::VectorDatabase::search_with_default_metric).
    #[serde(default)]
    pub metric: Metric,
    /// Parameters passed to the keyword extractor on every build.
    #[serde(default)]
    pub keywords: KeywordConfig,
    /// Maximum keyword extraction calls in flight during a build.
    #[serde(default = "default_keyword_concurrency")]
    pub keyword_concurrency: usize,
    /// Substitute an empty keyword list when extraction fails for a text,
    /// instead of failing the build.
    #[serde(default)]
    pub keyword_best_effort: bool,
    /// Reuse embeddings and keywords of texts already seen by this database.
    #[serde(default)]
    pub content_cache: bool,
}

fn default_keyword_concurrency() -> usize {
    8
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            metric: Metric::default(),
            keywords: KeywordConfig::default(),
            keyword_concurrency: default_keyword_concurrency(),
            keyword_best_effort: false,
            content_cache: false,
        }
    }
}

impl IndexConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> IndexResult<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| IndexError::Config(format!("Invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> IndexResult<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_toml_str(&data)
    }

    /// Reject settings no build could run with.
    pub fn validate(&self) -> IndexResult<()> {
        if self.keyword_concurrency == 0 {
            return Err(IndexError::Config(
                "keyword_concurrency must be at least 1".to_string(),
            ));
        }
        self.keywords.validate()
    }
}
