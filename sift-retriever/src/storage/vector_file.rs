//! Binary vector artifact.
//!
//! Layout (all integers in the writer's native byte order):
//!
//! | offset | size | field                              |
//! |--------|------|------------------------------------|
//! | 0      | 8    | magic `SIFTVEC1`                   |
//! | 8      | 4    | byte-order mark `0x01020304` (u32) |
//! | 12     | 4    | dimension (u32)                    |
//! | 16     | 8    | vector count (u64)                 |
//! | 24     | ..   | `count * dimension` f32 values     |
//!
//! A file written on a machine with the other byte order fails the mark check
//! and is reported as corrupt instead of being misread.

use super::{StagedFile, stage};
use crate::error::{IndexError, Result};
use std::path::Path;

const MAGIC: &[u8; 8] = b"SIFTVEC1";
const BYTE_ORDER_MARK: u32 = 0x0102_0304;
const HEADER_LEN: usize = 24;
const F32_LEN: usize = std::mem::size_of::<f32>();

/// Vectors read back from disk, flattened row by row.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredVectors {
    pub dimension: usize,
    pub count: usize,
    pub data: Vec<f32>,
}

/// Serialize `data` (`data.len()` must be a multiple of `dimension`) and
/// replace the file at `path`.
pub fn write_vectors(path: &Path, dimension: usize, data: &[f32]) -> Result<()> {
    stage_vectors(path, dimension, data)?.commit()
}

/// Stage a replacement vector file without touching the current one.
pub fn stage_vectors(path: &Path, dimension: usize, data: &[f32]) -> Result<StagedFile> {
    #[cfg(test)]
    if failpoint::take() {
        return Err(IndexError::io(
            path,
            std::io::Error::other("simulated vector write failure"),
        ));
    }

    let dim32 = u32::try_from(dimension)
        .map_err(|_| IndexError::corrupt(path, format!("dimension {dimension} too large")))?;
    let count = if dimension == 0 {
        0
    } else {
        data.len() / dimension
    };

    let mut bytes = Vec::with_capacity(HEADER_LEN + data.len() * F32_LEN);
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&BYTE_ORDER_MARK.to_ne_bytes());
    bytes.extend_from_slice(&dim32.to_ne_bytes());
    bytes.extend_from_slice(&(count as u64).to_ne_bytes());
    bytes.extend_from_slice(bytemuck::cast_slice(data));

    stage(path, &bytes)
}

/// Read the vector artifact. Returns `Ok(None)` when the file does not exist.
pub fn read_vectors(path: &Path) -> Result<Option<StoredVectors>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(IndexError::io(path, e)),
    };

    if bytes.len() < HEADER_LEN {
        return Err(IndexError::corrupt(path, "truncated vector header"));
    }
    if &bytes[0..8] != MAGIC {
        return Err(IndexError::corrupt(path, "not a vector file (bad magic)"));
    }
    let mark: u32 = bytemuck::pod_read_unaligned(&bytes[8..12]);
    if mark != BYTE_ORDER_MARK {
        return Err(IndexError::corrupt(
            path,
            "vector file was written with a different byte order",
        ));
    }
    let dimension = bytemuck::pod_read_unaligned::<u32>(&bytes[12..16]) as usize;
    let count = usize::try_from(bytemuck::pod_read_unaligned::<u64>(&bytes[16..24]))
        .map_err(|_| IndexError::corrupt(path, "vector count does not fit in memory"))?;

    if dimension == 0 && count > 0 {
        return Err(IndexError::corrupt(path, "zero dimension with stored vectors"));
    }
    let body = &bytes[HEADER_LEN..];
    let expected = count
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(F32_LEN))
        .ok_or_else(|| IndexError::corrupt(path, "vector header sizes overflow"))?;
    if body.len() != expected {
        return Err(IndexError::corrupt(
            path,
            format!(
                "expected {expected} bytes for {count} vectors of dimension {dimension}, found {}",
                body.len()
            ),
        ));
    }

    let data = body
        .chunks_exact(F32_LEN)
        .map(bytemuck::pod_read_unaligned::<f32>)
        .collect();

    Ok(Some(StoredVectors {
        dimension,
        count,
        data,
    }))
}

/// One-shot write failure for exercising recovery paths in tests.
#[cfg(test)]
pub(crate) mod failpoint {
    use std::cell::Cell;

    thread_local! {
        static FAIL_NEXT_WRITE: Cell<bool> = const { Cell::new(false) };
    }

    /// Make the next vector write on this thread fail.
    pub(crate) fn fail_next_write() {
        FAIL_NEXT_WRITE.with(|flag| flag.set(true));
    }

    pub(super) fn take() -> bool {
        FAIL_NEXT_WRITE.with(|flag| flag.replace(false))
    }
}
