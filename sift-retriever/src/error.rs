//! Error type shared by the indexing and retrieval components

use sift_embed::{CompletionError, EmbedError};
use std::path::{Path, PathBuf};

/// Result type for indexing and retrieval operations.
pub type Result<T> = std::result::Result<T, IndexError>;

/// Everything that can go wrong while tracking, indexing or querying documents.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Reading or writing a file failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The embedding provider failed
    #[error(transparent)]
    Embedding(#[from] EmbedError),

    /// The completion provider failed
    #[error(transparent)]
    Completion(#[from] CompletionError),

    /// A vector did not have the dimension the index was created with
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Persisted index artifacts are inconsistent or unreadable
    #[error("Corrupt index at {}: {reason}", path.display())]
    CorruptIndex { path: PathBuf, reason: String },

    /// No document produced any chunk
    #[error("Corpus produced no chunks to index")]
    EmptyCorpus,

    /// A query was issued before an index was built or loaded
    #[error("Index is not loaded; build or load it first")]
    NotLoaded,

    /// The fingerprint ledger exists but is not valid JSON of the expected shape
    #[error("Malformed fingerprint ledger at {}: {reason}", path.display())]
    Ledger { path: PathBuf, reason: String },

    /// Chunker parameters are invalid
    #[error(transparent)]
    Chunking(#[from] sift_context::ChunkerError),
}

impl IndexError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a corrupt-index error with a custom reason.
    pub fn corrupt(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::CorruptIndex {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }
}
