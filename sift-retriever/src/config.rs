//! Configuration file for the `sift` CLI and [`IndexManager`](crate::retrieval::index_manager::IndexManager).
//!
//! Every section and field is optional; missing values fall back to the
//! defaults below. A complete file looks like:
//!
//! ```toml
//! [corpus]
//! folder = "documents"
//! extensions = ["txt", "md"]
//!
//! [index]
//! prefix = "data/sift_index"
//! ledger = "data/processed_hashes.json"
//!
//! [chunking]
//! chunk_size = 512
//! overlap = 50
//!
//! [answer]
//! top_k = 5
//! max_context_chars = 6000
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-large"
//!
//! [completion]
//! model = "gpt-4o-mini"
//! temperature = 0.7
//! ```

use crate::retrieval::chunking_strategy::ChunkingConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sift_embed::{CompletionConfig, EmbedConfig};
use std::path::{Path, PathBuf};

/// Default instructions placed before the question and retrieved excerpts.
pub const DEFAULT_INSTRUCTIONS: &str = "You are a skilled analyst. Using the following excerpts \
from the indexed documents, carefully analyze the information and provide a clear, concise \
and insightful answer to the question below.";

/// Where documents come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    pub folder: PathBuf,
    /// File extensions to index; empty means every text-like file
    pub extensions: Vec<String>,
    pub recursive: bool,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("documents"),
            extensions: vec!["txt".to_string(), "md".to_string()],
            recursive: true,
        }
    }
}

/// Where the index artifacts and fingerprint ledger are stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Path prefix shared by `<prefix>.vectors` and `<prefix>_chunks.txt`
    pub prefix: PathBuf,
    pub ledger: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            prefix: PathBuf::from("data/sift_index"),
            ledger: PathBuf::from("data/processed_hashes.json"),
        }
    }
}

/// Retrieval and prompt settings for question answering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerConfig {
    /// Number of chunks retrieved per question
    pub top_k: usize,
    /// Upper bound on the characters of retrieved text placed in the prompt
    pub max_context_chars: usize,
    pub instructions: String,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_context_chars: 6000,
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    pub corpus: CorpusConfig,
    pub index: IndexConfig,
    pub chunking: ChunkingConfig,
    pub answer: AnswerConfig,
    pub embedding: EmbedConfig,
    pub completion: CompletionConfig,
}

impl RetrieverConfig {
    /// Read a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn with_corpus_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.corpus.folder = folder.into();
        self
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.corpus.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Put both index artifacts and the ledger under `dir`.
    pub fn with_index_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        self.index.prefix = dir.join("sift_index");
        self.index.ledger = dir.join("processed_hashes.json");
        self
    }

    pub fn with_chunking(mut self, chunk_size: usize, overlap: usize) -> Self {
        self.chunking = ChunkingConfig::new(chunk_size, overlap);
        self
    }

    pub fn with_embedding(mut self, embedding: EmbedConfig) -> Self {
        self.embedding = embedding;
        self
    }

    pub fn with_max_context_chars(mut self, max_context_chars: usize) -> Self {
        self.answer.max_context_chars = max_context_chars;
        self
    }
}
