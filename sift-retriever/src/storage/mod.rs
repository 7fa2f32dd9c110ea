//! On-disk artifacts for the vector index
//!
//! An index is two co-located files sharing one path prefix:
//!
//! ```text
//! <prefix>.vectors     binary header + count * dimension f32 values
//! <prefix>_chunks.txt  one chunk per line, in ordinal order
//! ```
//!
//! Line `i` of the chunk file is the text of vector `i`. Each file is
//! replaced through a temporary file and a rename, so a reader sees either the
//! old or the new version of each file, never a torn one. Callers that replace
//! both files [`stage`] them first and only then commit, so a failed write
//! leaves the previous pair untouched. The two renames still happen one after
//! the other, which is why loading always cross-checks their counts.

use crate::error::{IndexError, Result};
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

pub mod chunk_file;
pub mod vector_file;

/// Locations of the two index artifacts for a path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    prefix: PathBuf,
}

impl IndexPaths {
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// `<prefix>.vectors`
    pub fn vectors(&self) -> PathBuf {
        self.with_suffix(".vectors")
    }

    /// `<prefix>_chunks.txt`
    pub fn chunks(&self) -> PathBuf {
        self.with_suffix("_chunks.txt")
    }

    fn with_suffix(&self, suffix: &str) -> PathBuf {
        let mut path: OsString = self.prefix.as_os_str().to_owned();
        path.push(suffix);
        PathBuf::from(path)
    }
}

/// Contents written and synced next to their destination, not yet visible there.
#[derive(Debug)]
pub struct StagedFile {
    tmp: tempfile::NamedTempFile,
    path: PathBuf,
    len: usize,
}

impl StagedFile {
    /// Rename the staged contents over the destination.
    pub fn commit(self) -> Result<()> {
        let Self { tmp, path, len } = self;
        tmp.persist(&path).map_err(|e| IndexError::io(&path, e.error))?;
        tracing::debug!("Wrote {} bytes to {}", len, path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Write `bytes` to a synced temporary file in the directory of `path`.
/// Parent directories are created as needed. Dropping the result without
/// committing removes the temporary file.
pub fn stage(path: &Path, bytes: &[u8]) -> Result<StagedFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| IndexError::io(&dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| IndexError::io(&dir, e))?;
    tmp.write_all(bytes).map_err(|e| IndexError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| IndexError::io(tmp.path(), e))?;

    Ok(StagedFile {
        tmp,
        path: path.to_path_buf(),
        len: bytes.len(),
    })
}

/// Replace `path` with `bytes` via a temporary file in the same directory and
/// a rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    stage(path, bytes)?.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_artifact_paths() {
        let paths = IndexPaths::new("data/faiss_index");
        assert_eq!(paths.vectors(), PathBuf::from("data/faiss_index.vectors"));
        assert_eq!(paths.chunks(), PathBuf::from("data/faiss_index_chunks.txt"));
        assert_eq!(paths.prefix(), Path::new("data/faiss_index"));
    }

    #[test]
    fn test_write_atomic_creates_and_replaces() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("ledger.json");

        write_atomic(&path, b"first")?;
        assert_eq!(std::fs::read(&path)?, b"first");

        write_atomic(&path, b"second")?;
        assert_eq!(std::fs::read(&path)?, b"second");

        // Only the target file remains; the temporary was renamed over it.
        let entries = std::fs::read_dir(path.parent().unwrap())?.count();
        assert_eq!(entries, 1);
        Ok(())
    }

    #[test]
    fn test_dropped_stage_leaves_target_untouched() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("idx_chunks.txt");
        write_atomic(&path, b"old")?;

        let staged = stage(&path, b"new")?;
        assert_eq!(staged.path(), path.as_path());
        assert_eq!(std::fs::read(&path)?, b"old");
        drop(staged);

        assert_eq!(std::fs::read(&path)?, b"old");
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 1);

        stage(&path, b"new")?.commit()?;
        assert_eq!(std::fs::read(&path)?, b"new");
        Ok(())
    }
}
