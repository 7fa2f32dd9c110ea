use crate::error::Result;
use serde::{Deserialize, Serialize};
use sift_context::{Chunker, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, TextChunk};

/// Configuration for chunking documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum size of each chunk in characters
    pub chunk_size: usize,
    /// Characters of the previous chunk repeated at the start of the next one
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_overlap(mut self, overlap: usize) -> Self {
        self.overlap = overlap;
        self
    }
}

/// Strategy for chunking documents - delegates to sift-context
#[derive(Debug, Clone)]
pub struct ChunkingStrategy {
    chunker: Chunker,
}

impl ChunkingStrategy {
    /// Create a new chunking strategy, validating the configuration
    pub fn new(config: &ChunkingConfig) -> Result<Self> {
        Ok(Self {
            chunker: Chunker::new(config.chunk_size, config.overlap)?,
        })
    }

    /// Chunk one document's extracted text
    pub fn chunk_document(&self, document_id: &str, text: &str) -> Vec<TextChunk> {
        let chunks = self.chunker.get_chunks(text);

        tracing::debug!(
            "Chunked {} into {} chunks (max size: {}, overlap: {})",
            document_id,
            chunks.len(),
            self.chunker.chunk_size(),
            self.chunker.overlap()
        );

        chunks
    }
}
