use async_trait::async_trait;
use kwrag_core::{IndexError, IndexResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

use crate::embedding::EmbeddingProvider;
use crate::similarity::{cosine_similarity, magnitude};

/// Tokenize text into lowercase words, filtering tokens with length <= 1.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() > 1)
        .collect()
}

/// Stop-word list applied before candidate keywords are formed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopWords {
    /// The built-in English list.
    English,
    /// A caller-supplied list, compared case-insensitively.
    Custom(Vec<String>),
}

impl StopWords {
    fn contains(&self, word: &str) -> bool {
        match self {
            StopWords::English => ENGLISH_STOP_WORDS.contains(&word),
            StopWords::Custom(words) => words.iter().any(|w| w.eq_ignore_ascii_case(word)),
        }
    }
}

/// Parameters for a keyword extraction call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordConfig {
    /// Inclusive `(min, max)` number of words per keyphrase.
    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),
    /// Stop words dropped before forming candidates; `None` keeps every token.
    #[serde(default = "default_stop_words")]
    pub stop_words: Option<StopWords>,
    /// Log the text with its keywords marked.
    #[serde(default)]
    pub highlight: bool,
    /// Maximum number of keywords returned per text.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

fn default_stop_words() -> Option<StopWords> {
    Some(StopWords::English)
}

fn default_top_n() -> usize {
    5
}

impl Default for KeywordConfig {
    /// Single words, English stop words removed, no highlighting.
    fn default() -> Self {
        Self {
            ngram_range: default_ngram_range(),
            stop_words: default_stop_words(),
            highlight: false,
            top_n: default_top_n(),
        }
    }
}

impl KeywordConfig {
    /// Reject an empty or inverted `ngram_range`.
    pub fn validate(&self) -> IndexResult<()> {
        let (min, max) = self.ngram_range;
        if min == 0 || min > max {
            return Err(IndexError::Config(format!(
                "invalid ngram_range ({min}, {max}): need 1 <= min <= max"
            )));
        }
        Ok(())
    }

    /// Candidate keyphrases of `text` in first-occurrence order, deduplicated.
    pub fn candidates(&self, text: &str) -> Vec<String> {
        let tokens: Vec<String> = tokenize(text)
            .into_iter()
            .filter(|t| !self.stop_words.as_ref().is_some_and(|sw| sw.contains(t)))
            .collect();

        let (min, max) = self.ngram_range;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for n in min.max(1)..=max {
            for window in tokens.windows(n) {
                let phrase = window.join(" ");
                if seen.insert(phrase.clone()) {
                    out.push(phrase);
                }
            }
        }
        out
    }
}

/// Trait for extracting an ordered keyword list from a text.
#[async_trait]
pub trait KeywordExtractor: Send + Sync {
    /// Extract keywords from `text`, most relevant first.
    async fn extract(&self, text: &str, config: &KeywordConfig) -> IndexResult<Vec<String>>;
}

/// Ranks candidate phrases by embedding similarity to the whole text.
///
/// Candidates come from [`KeywordConfig::candidates`]. The text and every
/// candidate are embedded with the same provider, and the `top_n` candidates
/// closest to the text (cosine) are returned. Candidates embedding to a
/// zero vector are dropped.
pub struct EmbeddingKeywordExtractor {
    embedder: Arc<dyn EmbeddingProvider>,
}

impl EmbeddingKeywordExtractor {
    /// Extractor ranking candidates with `embedder`.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl KeywordExtractor for EmbeddingKeywordExtractor {
    async fn extract(&self, text: &str, config: &KeywordConfig) -> IndexResult<Vec<String>> {
        config.validate()?;
        let candidates = config.candidates(text);
        if candidates.is_empty() || config.top_n == 0 {
            return Ok(Vec::new());
        }

        let doc = self.embedder.embed(text).await?;
        if magnitude(&doc) == 0.0 {
            return Ok(Vec::new());
        }

        let refs: Vec<&str> = candidates.iter().map(String::as_str).collect();
        let vectors = self.embedder.embed_batch(&refs).await?;
        if vectors.len() != candidates.len() {
            return Err(IndexError::Embedding(format!(
                "expected {} candidate embeddings, got {}",
                candidates.len(),
                vectors.len()
            )));
        }

        let mut scored = Vec::with_capacity(candidates.len());
        for (candidate, vector) in candidates.into_iter().zip(&vectors) {
            if magnitude(vector) == 0.0 {
                continue;
            }
            scored.push((candidate, cosine_similarity(&doc, vector)?));
        }
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(config.top_n);

        let keywords: Vec<String> = scored.into_iter().map(|(k, _)| k).collect();
        if config.highlight {
            info!(text = %highlight(text, &keywords), "Extracted keywords");
        }
        Ok(keywords)
    }
}

/// Wrap every whole-word occurrence of a single-word keyword in `**`.
fn highlight(text: &str, keywords: &[String]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut word = String::new();
    let flush = |word: &mut String, out: &mut String| {
        if !word.is_empty() {
            if keywords.iter().any(|k| k == &word.to_lowercase()) {
                out.push_str("**");
                out.push_str(word);
                out.push_str("**");
            } else {
                out.push_str(word);
            }
            word.clear();
        }
    };
    for c in text.chars() {
        if c.is_alphanumeric() {
            word.push(c);
        } else {
            flush(&mut word, &mut out);
            out.push(c);
        }
    }
    flush(&mut word, &mut out);
    out
}

/// English stop words, lowercase.
pub const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost",
    "alone", "along", "already", "also", "although", "always", "am", "among", "amongst",
    "amoungst", "amount", "an", "and", "another", "any", "anyhow", "anyone", "anything", "anyway",
    "anywhere", "are", "around", "as", "at", "back", "be", "became", "because", "become",
    "becomes", "becoming", "been", "before", "beforehand", "behind", "being", "below", "beside",
    "besides", "between", "beyond", "bill", "both", "bottom", "but", "by", "call", "can",
    "cannot", "cant", "co", "con", "could", "couldnt", "cry", "de", "describe", "detail", "do",
    "done", "down", "due", "during", "each", "eg", "eight", "either", "eleven", "else",
    "elsewhere", "empty", "enough", "etc", "even", "ever", "every", "everyone", "everything",
    "everywhere", "except", "few", "fifteen", "fifty", "fill", "find", "fire", "first", "five",
    "for", "former", "formerly", "forty", "found", "four", "from", "front", "full", "further",
    "get", "give", "go", "had", "has", "hasnt", "have", "he", "hence", "her", "here",
    "hereafter", "hereby", "herein", "hereupon", "hers", "herself", "him", "himself", "his",
    "how", "however", "hundred", "i", "ie", "if", "in", "inc", "indeed", "interest", "into",
    "is", "it", "its", "itself", "keep", "last", "latter", "latterly", "least", "less", "ltd",
    "made", "many", "may", "me", "meanwhile", "might", "mill", "mine", "more", "moreover",
    "most", "mostly", "move", "much", "must", "my", "myself", "name", "namely", "neither",
    "never", "nevertheless", "next", "nine", "no", "nobody", "none", "noone", "nor", "not",
    "nothing", "now", "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto",
    "or", "other", "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own",
    "part", "per", "perhaps", "please", "put", "rather", "re", "same", "see", "seem", "seemed",
    "seeming", "seems", "serious", "several", "she", "should", "show", "side", "since",
    "sincere", "six", "sixty", "so", "some", "somehow", "someone", "something", "sometime",
    "sometimes", "somewhere", "still", "such", "system", "take", "ten", "than", "that", "the",
    "their", "them", "themselves", "then", "thence", "there", "thereafter", "thereby",
    "therefore", "therein", "thereupon", "these", "they", "thick", "thin", "third", "this",
    "those", "though", "three", "through", "throughout", "thru", "thus", "to", "together",
    "too", "top", "toward", "towards", "twelve", "twenty", "two", "un", "under", "until", "up",
    "upon", "us", "very", "via", "was", "we", "well", "were", "what", "whatever", "when",
    "whence", "whenever", "where", "whereafter", "whereas", "whereby", "wherein", "whereupon",
    "wherever", "whether", "which", "while", "whither", "who", "whoever", "whole", "whom",
    "whose", "why", "will", "with", "within", "without", "would", "yet", "you", "your",
    "yours", "yourself", "yourselves",
];

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::embedding::LocalEmbedding;

    fn extractor() -> EmbeddingKeywordExtractor {
        EmbeddingKeywordExtractor::new(Arc::new(LocalEmbedding::default()))
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("I ate a Banana!"), vec!["ate", "banana"]);
        assert!(tokenize("  ").is_empty());
    }

    #[test]
    fn test_candidates_drop_stop_words() {
        let config = KeywordConfig::default();
        let c = config.candidates("I ate a banana and spinach smoothie for breakfast.");
        assert_eq!(c, vec!["ate", "banana", "spinach", "smoothie", "breakfast"]);
    }

    #[test]
    fn test_candidates_dedup_and_bigrams() {
        let config = KeywordConfig {
            ngram_range: (1, 2),
            stop_words: None,
            ..KeywordConfig::default()
        };
        let c = config.candidates("red fox red fox");
        assert_eq!(c, vec!["red", "fox", "red fox", "fox red"]);
    }

    #[test]
    fn test_custom_stop_words() {
        let config = KeywordConfig {
            stop_words: Some(StopWords::Custom(vec!["Banana".into()])),
            ..KeywordConfig::default()
        };
        assert_eq!(config.candidates("banana and kiwi"), vec!["and", "kiwi"]);
    }

    #[test]
    fn test_validate_ngram_range() {
        let mut config = KeywordConfig::default();
        assert!(config.validate().is_ok());
        config.ngram_range = (0, 1);
        assert!(config.validate().is_err());
        config.ngram_range = (3, 2);
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_extract_returns_candidate_words() {
        let config = KeywordConfig::default();
        let keywords = extractor()
            .extract("Chinchillas and kittens are cute.", &config)
            .await
            .unwrap();
        let mut sorted = keywords.clone();
        sorted.sort();
        assert_eq!(sorted, vec!["chinchillas", "cute", "kittens"]);
    }

    #[tokio::test]
    async fn test_extract_respects_top_n() {
        let config = KeywordConfig {
            top_n: 2,
            ..KeywordConfig::default()
        };
        let keywords = extractor()
            .extract("Look at this cute hamster munching on a piece of broccoli.", &config)
            .await
            .unwrap();
        assert_eq!(keywords.len(), 2);
    }

    #[tokio::test]
    async fn test_extract_degenerate_text() {
        let config = KeywordConfig::default();
        assert!(extractor().extract("", &config).await.unwrap().is_empty());
        assert!(extractor().extract("the and of", &config).await.unwrap().is_empty());
    }

    #[test]
    fn test_highlight() {
        let out = highlight("Cute kittens, cute!", &["cute".to_string()]);
        assert_eq!(out, "**Cute** kittens, **cute**!");
    }
}
