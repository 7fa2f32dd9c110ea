//! Plain-text chunk artifact: one chunk per line, in ordinal order.

use super::{StagedFile, stage};
use crate::error::{IndexError, Result};
use std::path::Path;

/// Replace the chunk file at `path`. Line breaks inside a chunk are written as
/// spaces so that line `i` is always chunk `i`.
pub fn write_chunks(path: &Path, chunks: &[String]) -> Result<()> {
    stage_chunks(path, chunks)?.commit()
}

/// Stage a replacement chunk file without touching the current one.
pub fn stage_chunks(path: &Path, chunks: &[String]) -> Result<StagedFile> {
    let mut contents = String::with_capacity(chunks.iter().map(|c| c.len() + 1).sum());
    for chunk in chunks {
        contents.extend(chunk.chars().map(|c| match c {
            '\n' | '\r' => ' ',
            other => other,
        }));
        contents.push('\n');
    }
    stage(path, contents.as_bytes())
}

/// Read the chunk file. Returns `Ok(None)` when the file does not exist.
pub fn read_chunks(path: &Path) -> Result<Option<Vec<String>>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
            return Err(IndexError::corrupt(path, "chunk file is not valid UTF-8"));
        }
        Err(e) => return Err(IndexError::io(path, e)),
    };
    Ok(Some(contents.lines().map(str::to_string).collect()))
}
