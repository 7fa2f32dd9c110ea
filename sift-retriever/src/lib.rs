//! sift-retriever: incremental document indexing and retrieval
//!
//! This crate keeps a vector index of a document corpus up to date without
//! re-embedding documents that did not change, and answers questions from the
//! most relevant passages.
//!
//! ## Key Modules
//!
//! - **[`retrieval`]**: Change tracking, corpus listing, chunking, the vector
//!   index and the [`IndexManager`](retrieval::index_manager::IndexManager)
//!   that orchestrates them
//! - **[`storage`]**: The on-disk vector and chunk artifacts
//! - **[`config`]**: TOML configuration for the `sift` CLI
//! - **[`error`]**: [`IndexError`](error::IndexError) and the crate's `Result` alias
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sift_retriever::config::RetrieverConfig;
//! use sift_retriever::retrieval::{corpus::DirectoryCorpus, index_manager::IndexManager};
//! use sift_embed::EmbedConfig;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = RetrieverConfig::default()
//!     .with_corpus_folder("documents")
//!     .with_embedding(EmbedConfig::hashing(256));
//! let embedder = config.embedding.build_provider()?;
//!
//! let mut manager = IndexManager::new(&config, embedder)?;
//! let listing = DirectoryCorpus::new(&config.corpus.folder).list()?;
//! let report = manager.build_or_update(&listing).await?;
//! println!("{:?}: {} chunks", report.outcome, report.total_chunks);
//!
//! for hit in manager.retrieve("What drove revenue growth?", 5).await? {
//!     println!("{:.3} {}", hit.distance, hit.chunk.text);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! DirectoryCorpus → ChangeTracker → TextExtractor → ChunkingStrategy
//!                        ↑                                 ↓
//!                 ledger (JSON)   ←   commit   ←   VectorIndex (.vectors + _chunks.txt)
//! ```

pub mod config;
pub mod error;
pub mod retrieval;
pub mod storage;

pub use error::{IndexError, Result};
