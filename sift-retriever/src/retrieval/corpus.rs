//! Corpus listing and text extraction.
//!
//! A corpus is a flat list of [`CorpusEntry`] values. [`DirectoryCorpus`]
//! builds one from a folder; anything else (a crawler, a database export) can
//! produce entries directly. Turning a document into text goes through the
//! [`TextExtractor`] seam, so formats such as PDF can be plugged in without
//! touching the indexing pipeline.

use crate::error::{IndexError, Result};
use async_trait::async_trait;
use ignore::WalkBuilder;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// One document in the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorpusEntry {
    /// Stable identifier used by the fingerprint ledger
    pub document_id: String,
    /// Where to read the document from
    pub path: PathBuf,
}

impl CorpusEntry {
    pub fn new(document_id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            document_id: document_id.into(),
            path: path.into(),
        }
    }
}

/// Lists the files under a folder as corpus entries.
///
/// Document ids are paths relative to the root, joined with `/` on every
/// platform. Hidden files and anything matched by `.gitignore`/`.ignore` files
/// are skipped.
#[derive(Debug, Clone)]
pub struct DirectoryCorpus {
    root: PathBuf,
    extensions: Vec<String>,
    recursive: bool,
}

impl DirectoryCorpus {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: Vec::new(),
            recursive: true,
        }
    }

    /// Only list files with one of these extensions (case-insensitive, without
    /// the leading dot). An empty list keeps every file that looks like text.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    /// Descend into subdirectories (default) or only list the root folder.
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the folder and return its entries sorted by document id.
    pub fn list(&self) -> Result<Vec<CorpusEntry>> {
        let mut builder = WalkBuilder::new(&self.root);
        builder.hidden(true).git_ignore(true).ignore(true).require_git(false);
        if !self.recursive {
            builder.max_depth(Some(1));
        }

        let mut entries = Vec::new();
        for result in builder.build() {
            let entry = result.map_err(|err| {
                let message = err.to_string();
                let source = err
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other(message));
                IndexError::io(&self.root, source)
            })?;

            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.path();
            if !self.accepts(path) {
                continue;
            }
            let Ok(relative) = path.strip_prefix(&self.root) else {
                continue;
            };
            let document_id = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            entries.push(CorpusEntry::new(document_id, path));
        }

        entries.sort_by(|a, b| a.document_id.cmp(&b.document_id));
        tracing::debug!(
            "Listed {} documents under {}",
            entries.len(),
            self.root.display()
        );
        Ok(entries)
    }

    /// Check if a file should be indexed based on its path
    fn accepts(&self, path: &Path) -> bool {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());

        if !self.extensions.is_empty() {
            return extension.is_some_and(|ext| self.extensions.contains(&ext));
        }

        match extension.as_deref() {
            // Binary and generated files we skip
            Some("exe") | Some("dll") | Some("so") | Some("dylib") | Some("bin") | Some("png")
            | Some("jpg") | Some("jpeg") | Some("gif") | Some("ico") | Some("wasm")
            | Some("lock") | Some("zip") | Some("gz") | Some("vectors") => false,
            _ => true,
        }
    }
}

/// Turns a document on disk into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<String>;
}

/// Reads files as UTF-8, replacing invalid sequences.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| IndexError::io(path, e))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(root: &Path, relative: &str, contents: &str) -> std::io::Result<()> {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)
    }

    #[test]
    fn test_lists_sorted_relative_ids() -> anyhow::Result<()> {
        let dir = tempdir()?;
        write(dir.path(), "b.txt", "beta")?;
        write(dir.path(), "a.md", "alpha")?;
        write(dir.path(), "reports/q1.txt", "q1")?;
        write(dir.path(), ".hidden.txt", "secret")?;
        write(dir.path(), "logo.png", "not text")?;

        let ids: Vec<String> = DirectoryCorpus::new(dir.path())
            .list()?
            .into_iter()
            .map(|e| e.document_id)
            .collect();
        assert_eq!(ids, vec!["a.md", "b.txt", "reports/q1.txt"]);
        Ok(())
    }

    #[test]
    fn test_extension_filter_and_depth() -> anyhow::Result<()> {
        let dir = tempdir()?;
        write(dir.path(), "annual.TXT", "annual")?;
        write(dir.path(), "notes.md", "notes")?;
        write(dir.path(), "archive/old.txt", "old")?;

        let corpus = DirectoryCorpus::new(dir.path()).with_extensions([".txt"]);
        let ids: Vec<String> = corpus.list()?.into_iter().map(|e| e.document_id).collect();
        assert_eq!(ids, vec!["annual.TXT", "archive/old.txt"]);

        let flat = corpus.with_recursive(false).list()?;
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].path, dir.path().join("annual.TXT"));
        Ok(())
    }

    #[test]
    fn test_respects_ignore_file() -> anyhow::Result<()> {
        let dir = tempdir()?;
        write(dir.path(), ".ignore", "drafts/\n")?;
        write(dir.path(), "final.txt", "final")?;
        write(dir.path(), "drafts/wip.txt", "wip")?;

        let entries = DirectoryCorpus::new(dir.path()).list()?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].document_id, "final.txt");
        Ok(())
    }

    #[tokio::test]
    async fn test_plain_text_extractor_is_lossy() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, b"caf\xc3\xa9 \xff ok")?;

        let text = PlainTextExtractor.extract(&path).await?;
        assert_eq!(text, "café \u{fffd} ok");

        let missing = PlainTextExtractor.extract(&dir.path().join("nope.txt")).await;
        assert!(matches!(missing, Err(IndexError::Io { .. })));
        Ok(())
    }
}
