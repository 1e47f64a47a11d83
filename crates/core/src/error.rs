//! Error types for the passage retrieval pipeline.
//!
//! This module defines a unified error enum covering every failure category
//! the pipeline can produce: configuration, I/O, embedding provider failures
//! (transient vs permanent), index invariant violations, and persistence
//! corruption.

use thiserror::Error;

/// Unified error type for the passage pipeline.
///
/// All fallible functions in the workspace return `Result<T, PassageError>`.
/// We never panic — errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum PassageError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedding provider failure. `transient` failures (timeouts, rate
    /// limits, connection drops) are eligible for retry; permanent ones
    /// (auth, malformed input, partial batches) are not.
    #[error("Embedding error: {message}")]
    Embedding { message: String, transient: bool },

    /// A vector's dimension disagrees with the index's established dimension.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A query was issued before any document was ingested.
    #[error("Index is empty: ingest at least one document before querying")]
    EmptyIndex,

    /// Persisted index state is unreadable or internally inconsistent.
    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    /// Two ingestions of the same document id were in flight at once.
    #[error("Document '{document_id}' is already being ingested")]
    IngestionConflict { document_id: String },

    /// Vector index storage errors (SQLite layer)
    #[error("Index error: {0}")]
    Index(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PassageError {
    /// Build a retryable embedding error.
    pub fn embedding_transient(message: impl Into<String>) -> Self {
        PassageError::Embedding {
            message: message.into(),
            transient: true,
        }
    }

    /// Build a non-retryable embedding error.
    pub fn embedding_permanent(message: impl Into<String>) -> Self {
        PassageError::Embedding {
            message: message.into(),
            transient: false,
        }
    }

    /// Whether the error is worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, PassageError::Embedding { transient: true, .. })
    }
}

impl From<serde_json::Error> for PassageError {
    fn from(err: serde_json::Error) -> Self {
        PassageError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for PassageError {
    fn from(err: serde_yaml::Error) -> Self {
        PassageError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with PassageError.
pub type PassageResult<T> = Result<T, PassageError>;
