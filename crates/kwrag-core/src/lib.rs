//! Core types and error definitions for the kwrag index.
//!
//! This crate holds the error taxonomy shared by every kwrag crate.
//!
//! # Main types
//!
//! - [`IndexError`] — Unified error enum for the store, query engine and collaborators.
//! - [`IndexResult`] — Convenience alias for `Result<T, IndexError>`.

// --- Error types ---

/// Top-level error type for the kwrag index.
///
/// Lookups by key never produce an error: a missing key is reported as `None`.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// A vector could not be scored: mismatched or empty dimensionality,
    /// a zero norm, or a non-finite component.
    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    /// A record key was rejected by the store.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// The embedding service failed or broke its positional contract.
    #[error("Embedding service error: {0}")]
    Embedding(String),

    /// The keyword extraction service failed.
    #[error("Keyword extraction error: {0}")]
    KeywordExtraction(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IndexError {
    /// Whether this error was raised by one of the external collaborators.
    pub fn is_service_failure(&self) -> bool {
        matches!(self, Self::Embedding(_) | Self::KeywordExtraction(_))
    }
}

/// A convenience `Result` alias using [`IndexError`].
pub type IndexResult<T> = Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_failure_grouping() {
        assert!(IndexError::Embedding("down".into()).is_service_failure());
        assert!(IndexError::KeywordExtraction("down".into()).is_service_failure());
        assert!(!IndexError::InvalidVector("zero norm".into()).is_service_failure());
        assert!(!IndexError::Config("bad".into()).is_service_failure());
    }

    #[test]
    fn test_error_display() {
        let err = IndexError::InvalidVector("expected 3 dimensions, got 2".into());
        assert_eq!(err.to_string(), "Invalid vector: expected 3 dimensions, got 2");

        let io = IndexError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
        assert!(io.to_string().starts_with("IO error:"));
    }
}
