//! This module turns extracted document text into bounded, overlapping chunks
//! suitable for embedding, specifically designed for the incremental indexing
//! pipeline in `sift-retriever`.
//!
//! The module defines two main items:
//! - [`Chunker`]: Holds the chunking parameters (size, overlap, delimiters) and
//!   produces chunks from text.
//! - [`TextChunk`]: A single segment of normalized text along with its position in
//!   the sequence of chunks produced for one document.
//!
//! # Chunking Model
//!
//! *   **Normalization**: Every run of whitespace (including newlines) collapses to
//!     a single space and the result is trimmed. Chunks therefore never contain a
//!     newline, which keeps the one-chunk-per-line artifact format exact.
//! *   **Character budget**: `chunk_size` and `overlap` count characters (Unicode
//!     scalar values), not bytes. No chunk is longer than `chunk_size`.
//! *   **Recursive Splitting**: `split_recursively_into_segments` breaks the text
//!     on the most significant delimiter first (sentence ends), then clause
//!     punctuation, then spaces, and finally by raw characters, so chunk
//!     boundaries prefer natural breaks.
//! *   **Overlap**: Every chunk after the first starts with the last
//!     `min(overlap, previous chunk length)` characters of the previous chunk.
//! *   **Reconstruction**: Stripping that overlap prefix from each non-first chunk
//!     and concatenating yields the normalized input exactly
//!     (see [`Chunker::reassemble`]).
//!
//! # Usage
//!
//! ```
//! use sift_context::text::{Chunker, normalize_whitespace};
//!
//! let chunker = Chunker::new(40, 10).unwrap();
//!
//! let text = "Revenue grew in the third quarter.\n\nMargins were stable, \
//!             and the outlook for next year remains positive.";
//!
//! let chunks = chunker.get_chunks(text);
//! assert!(chunks.len() > 1);
//! assert!(chunks.iter().all(|c| c.char_len() <= 40 && !c.text.is_empty()));
//!
//! // Chunking is deterministic.
//! assert_eq!(chunks, chunker.get_chunks(text));
//!
//! // Removing each overlap prefix restores the normalized text.
//! assert_eq!(chunker.reassemble(&chunks), normalize_whitespace(text));
//! ```
use regex::Regex;
use serde::Serialize;
use std::ops::Range;

/// Default chunk length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 512;

/// Default number of trailing characters repeated at the start of the next chunk.
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Default regular expression patterns for splitting normalized prose.
///
/// These delimiters are ordered from most significant to least significant,
/// guiding the recursive splitting process in [`Chunker::get_chunks`].
/// Because text is whitespace-normalized first, a single space is the only
/// separator that can follow punctuation.
///
/// - `[.!?] `: Sentence endings.
/// - `[,;:] `: Clause punctuation.
/// - ` `: Word boundaries, the most granular delimiter.
pub const DEFAULT_DELIMITERS: &[&str] = &[
    r"[.!?] ", // Sentences
    r"[,;:] ", // Clauses
    r" ",      // Words
];

/// Errors raised when a [`Chunker`] is configured with invalid parameters.
#[derive(Debug, thiserror::Error)]
pub enum ChunkerError {
    /// The chunk size must allow at least one character.
    #[error("chunk size must be greater than zero")]
    ZeroSize,

    /// The overlap must leave room for new text in every chunk.
    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})")]
    InvalidOverlap { chunk_size: usize, overlap: usize },

    /// A delimiter pattern failed to compile.
    #[error("invalid delimiter pattern {pattern:?}: {source}")]
    InvalidDelimiter {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Collapses every whitespace run to a single space and trims both ends.
///
/// This is the normalization applied to all text before chunking.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A single chunk of normalized text produced for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextChunk {
    /// The position of this chunk within the document's chunk sequence (0-indexed).
    pub sequence: usize,
    /// The chunk text, including any overlap carried over from the previous chunk.
    pub text: String,
}

impl TextChunk {
    /// Length of the chunk text in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Splits text into bounded, overlapping chunks.
///
/// A `Chunker` is a pure function of its configuration: calling
/// [`get_chunks`](Self::get_chunks) twice on the same input always returns the
/// same output.
#[derive(Debug, Clone)]
pub struct Chunker {
    delimiters: Vec<Regex>,
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    /// Creates a chunker with the [`DEFAULT_DELIMITERS`].
    ///
    /// # Errors
    ///
    /// Returns [`ChunkerError::ZeroSize`] if `chunk_size` is zero and
    /// [`ChunkerError::InvalidOverlap`] unless `overlap < chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkerError> {
        Self::with_delimiters(chunk_size, overlap, DEFAULT_DELIMITERS)
    }

    /// Creates a chunker with custom delimiter patterns.
    ///
    /// Delimiters are applied in the order they appear in the slice, from most
    /// significant to least significant. Patterns are matched against
    /// whitespace-normalized text.
    ///
    /// # Examples
    ///
    /// ```
    /// use sift_context::text::Chunker;
    ///
    /// let chunker = Chunker::with_delimiters(20, 0, &[r"; ", r" "]).unwrap();
    /// let chunks = chunker.get_chunks("alpha beta; gamma delta; epsilon");
    /// assert_eq!(chunks[0].text, "alpha beta; ");
    /// assert_eq!(chunks[1].text, "gamma delta; epsilon");
    /// ```
    pub fn with_delimiters(
        chunk_size: usize,
        overlap: usize,
        delimiter_patterns: &[&str],
    ) -> Result<Self, ChunkerError> {
        if chunk_size == 0 {
            return Err(ChunkerError::ZeroSize);
        }
        if overlap >= chunk_size {
            return Err(ChunkerError::InvalidOverlap {
                chunk_size,
                overlap,
            });
        }

        let delimiters = delimiter_patterns
            .iter()
            .map(|&pattern| {
                Regex::new(pattern).map_err(|source| ChunkerError::InvalidDelimiter {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Chunker {
            delimiters,
            chunk_size,
            overlap,
        })
    }

    /// Maximum chunk length in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of trailing characters repeated at the start of the next chunk.
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Splits `text` into an ordered sequence of [`TextChunk`]s.
    ///
    /// The text is normalized with [`normalize_whitespace`] first. Empty or
    /// whitespace-only input produces no chunks; otherwise every chunk is
    /// non-empty and at most `chunk_size` characters long. The final chunk may
    /// be shorter than `chunk_size` and is always emitted.
    pub fn get_chunks(&self, text: &str) -> Vec<TextChunk> {
        let normalized = normalize_whitespace(text);
        if normalized.is_empty() {
            return Vec::new();
        }

        // Every segment must fit next to a full overlap prefix.
        let body_limit = self.chunk_size - self.overlap;
        let segments = self.split_recursively_into_segments(&normalized, 0, body_limit, 0);

        let mut chunks: Vec<TextChunk> = Vec::new();
        let mut prefix = String::new();
        let mut prefix_chars = 0;
        let mut body: Option<Range<usize>> = None;
        let mut body_chars = 0;

        for segment_range in segments {
            let segment_chars = normalized[segment_range.clone()].chars().count();

            match body.as_mut() {
                // If adding the segment makes the chunk too large,
                // push the current chunk and start a new one.
                Some(current) if prefix_chars + body_chars + segment_chars > self.chunk_size => {
                    let text = format!("{prefix}{}", &normalized[current.clone()]);
                    prefix = tail_chars(&text, self.overlap).to_string();
                    prefix_chars = prefix.chars().count();
                    chunks.push(TextChunk {
                        sequence: chunks.len(),
                        text,
                    });
                    body = Some(segment_range);
                    body_chars = segment_chars;
                }
                Some(current) => {
                    current.end = segment_range.end;
                    body_chars += segment_chars;
                }
                None => {
                    body = Some(segment_range);
                    body_chars = segment_chars;
                }
            }
        }

        if let Some(current) = body {
            chunks.push(TextChunk {
                sequence: chunks.len(),
                text: format!("{prefix}{}", &normalized[current]),
            });
        }

        chunks
    }

    /// Rebuilds the normalized text from chunks produced by this chunker.
    ///
    /// The overlap prefix of each non-first chunk is stripped before
    /// concatenation.
    pub fn reassemble(&self, chunks: &[TextChunk]) -> String {
        let mut out = String::new();
        let mut previous_chars: Option<usize> = None;

        for chunk in chunks {
            let skip = previous_chars.map_or(0, |chars| chars.min(self.overlap));
            out.extend(chunk.text.chars().skip(skip));
            previous_chars = Some(chunk.char_len());
        }

        out
    }

    // Recursively splits the text into contiguous segments based on delimiters.
    // Returns byte ranges into the normalized text. Each range is at most
    // `max_chars` characters long, and together they cover the text exactly.
    fn split_recursively_into_segments(
        &self,
        text: &str,
        delimiter_idx: usize,
        max_chars: usize,
        current_offset: usize,
    ) -> Vec<Range<usize>> {
        let mut result_segments: Vec<Range<usize>> = Vec::new();

        if text.is_empty() {
            return result_segments;
        }

        if text.chars().count() <= max_chars {
            result_segments.push(current_offset..(current_offset + text.len()));
            return result_segments;
        }

        // Out of delimiters and still too large: split by characters.
        if delimiter_idx >= self.delimiters.len() {
            hard_split(text, current_offset, max_chars, &mut result_segments);
            return result_segments;
        }

        let current_delimiter = &self.delimiters[delimiter_idx];
        let mut local_byte_start = 0;

        for mat in current_delimiter.find_iter(text) {
            if mat.start() > local_byte_start {
                result_segments.extend(self.split_recursively_into_segments(
                    &text[local_byte_start..mat.start()],
                    delimiter_idx + 1,
                    max_chars,
                    current_offset + local_byte_start,
                ));
            }
            // The delimiter itself is a segment.
            hard_split(
                mat.as_str(),
                current_offset + mat.start(),
                max_chars,
                &mut result_segments,
            );
            local_byte_start = mat.end();
        }

        if local_byte_start < text.len() {
            result_segments.extend(self.split_recursively_into_segments(
                &text[local_byte_start..],
                delimiter_idx + 1,
                max_chars,
                current_offset + local_byte_start,
            ));
        }

        result_segments
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
            .expect("default chunk parameters are valid")
    }
}

/// Pushes ranges of at most `max_chars` characters covering `text`.
fn hard_split(text: &str, offset: usize, max_chars: usize, out: &mut Vec<Range<usize>>) {
    let mut start = 0;
    let mut chars = 0;
    for (idx, _) in text.char_indices() {
        if chars == max_chars {
            out.push(offset + start..offset + idx);
            start = idx;
            chars = 0;
        }
        chars += 1;
    }
    if start < text.len() {
        out.push(offset + start..offset + text.len());
    }
}

/// Chunks `text` with a one-off [`Chunker`] using the default delimiters.
pub fn chunk(
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<TextChunk>, ChunkerError> {
    Ok(Chunker::new(chunk_size, overlap)?.get_chunks(text))
}

/// The last `n` characters of `text` (all of it if shorter).
fn tail_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match text.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> String {
        (0..40)
            .map(|i| format!("Line item {i} shows revenue growth of {i} percent.\n"))
            .collect()
    }

    #[test]
    fn test_get_chunks_basic() {
        let chunker = Chunker::new(120, 20).unwrap();
        let text = sample_report();
        let chunks = chunker.get_chunks(&text);

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.sequence, i);
            assert!(chunk.char_len() <= 120);
            assert!(!chunk.text.is_empty());
            assert!(!chunk.text.contains('\n'));
        }
        assert_eq!(chunker.reassemble(&chunks), normalize_whitespace(&text));
    }

    #[test]
    fn test_chunk_matches_chunker() {
        let text = sample_report();
        let chunks = chunk(&text, 80, 10).unwrap();
        assert_eq!(chunks, Chunker::new(80, 10).unwrap().get_chunks(&text));
        assert!(chunk(&text, 10, 10).is_err());
        assert!(chunk("   ", 10, 2).unwrap().is_empty());
    }

    #[test]
    fn test_get_chunks_is_deterministic() {
        let chunker = Chunker::new(64, 16).unwrap();
        let text = sample_report();
        assert_eq!(chunker.get_chunks(&text), chunker.get_chunks(&text));
    }

    #[test]
    fn test_overlap_prefix_matches_previous_tail() {
        let chunker = Chunker::new(50, 12).unwrap();
        let chunks = chunker.get_chunks(&sample_report());

        for pair in chunks.windows(2) {
            let tail = tail_chars(&pair[0].text, 12);
            assert!(
                pair[1].text.starts_with(tail),
                "chunk {:?} should start with {:?}",
                pair[1].text,
                tail
            );
        }
    }

    #[test]
    fn test_get_chunks_single_chunk() {
        let chunker = Chunker::new(500, 50).unwrap();
        let chunks = chunker.get_chunks("  A very short   report.\n");

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "A very short report.");
    }

    #[test]
    fn test_get_chunks_empty_content() {
        let chunker = Chunker::default();
        assert!(chunker.get_chunks("").is_empty());
        assert!(chunker.get_chunks(" \n\t  \n").is_empty());
    }

    #[test]
    fn test_final_short_chunk_is_kept() {
        let chunker = Chunker::new(10, 0).unwrap();
        let chunks = chunker.get_chunks("abcdefghij klm");

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "abcdefghij");
        assert_eq!(chunks[1].text, " klm");
    }

    #[test]
    fn test_long_word_is_hard_split_on_char_boundaries() {
        let chunker = Chunker::new(8, 3).unwrap();
        let text = "ééééééééééééééééééééé";
        let chunks = chunker.get_chunks(text);

        assert!(chunks.iter().all(|c| c.char_len() <= 8));
        assert_eq!(chunker.reassemble(&chunks), text);
    }

    #[test]
    fn test_prefers_sentence_boundaries() {
        let chunker = Chunker::new(60, 0).unwrap();
        let chunks =
            chunker.get_chunks("Net profit rose sharply. Costs were flat. Guidance was raised.");

        assert_eq!(chunks[0].text, "Net profit rose sharply. Costs were flat. ");
        assert_eq!(chunks[1].text, "Guidance was raised.");
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(Chunker::new(0, 0), Err(ChunkerError::ZeroSize)));
        assert!(matches!(
            Chunker::new(10, 10),
            Err(ChunkerError::InvalidOverlap {
                chunk_size: 10,
                overlap: 10
            })
        ));
        assert!(matches!(
            Chunker::with_delimiters(10, 0, &["("]),
            Err(ChunkerError::InvalidDelimiter { .. })
        ));
    }

    #[test]
    fn test_minimal_body_still_progresses() {
        let chunker = Chunker::new(2, 1).unwrap();
        let chunks = chunker.get_chunks("a b. c");

        assert!(chunks.iter().all(|c| (1..=2).contains(&c.char_len())));
        assert_eq!(chunker.reassemble(&chunks), "a b. c");
    }
}
