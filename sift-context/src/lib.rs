pub mod text;

// Re-export the chunking entry points for external use
pub use text::{
    Chunker, ChunkerError, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_DELIMITERS,
    TextChunk, chunk, normalize_whitespace,
};
