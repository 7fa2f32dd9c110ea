//! Content-addressed change detection over a document corpus.
//!
//! The tracker keeps a ledger mapping each document id to the BLAKE3 digest
//! of the content that was last indexed. A document is *changed* when its id
//! is not in the ledger or its current digest differs. The ledger is only
//! committed after the index write it describes has succeeded, so after a
//! crash the ledger may understate progress but never overstate it.
//!
//! The persisted ledger is a pretty-printed JSON object with sorted keys:
//!
//! ```json
//! {
//!   "reports/q1.txt": "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262"
//! }
//! ```

use super::corpus::CorpusEntry;
use crate::error::{IndexError, Result};
use crate::storage::write_atomic;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Files are hashed in blocks of this many bytes.
pub const HASH_BLOCK_SIZE: usize = 8192;

/// 256-bit BLAKE3 digest of a document's bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn of_bytes(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64-character hex digest.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let bytes: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A document whose content differs from what was last indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedDocument {
    pub document_id: String,
    pub path: PathBuf,
    /// Digest of the current content, to be committed once indexed
    pub fingerprint: Fingerprint,
}

/// Fingerprint ledger for a corpus.
#[derive(Debug, Clone)]
pub struct ChangeTracker {
    ledger_path: PathBuf,
    fingerprints: BTreeMap<String, Fingerprint>,
}

impl ChangeTracker {
    /// Open the ledger at `ledger_path`. A missing file is an empty ledger.
    pub fn open(ledger_path: impl Into<PathBuf>) -> Result<Self> {
        let ledger_path = ledger_path.into();
        let fingerprints = match std::fs::read_to_string(&ledger_path) {
            Ok(contents) => parse_ledger(&ledger_path, &contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(IndexError::io(&ledger_path, e)),
        };
        debug!(
            "Opened ledger {} with {} entries",
            ledger_path.display(),
            fingerprints.len()
        );
        Ok(Self {
            ledger_path,
            fingerprints,
        })
    }

    /// An empty ledger that will be saved to the same path as this one.
    pub fn emptied(&self) -> Self {
        Self {
            ledger_path: self.ledger_path.clone(),
            fingerprints: BTreeMap::new(),
        }
    }

    /// Digest a file, streaming it in [`HASH_BLOCK_SIZE`] blocks.
    pub fn hash_of(path: &Path) -> Result<Fingerprint> {
        let mut file = std::fs::File::open(path).map_err(|e| IndexError::io(path, e))?;
        let mut hasher = blake3::Hasher::new();
        let mut block = [0u8; HASH_BLOCK_SIZE];
        loop {
            let n = match file.read(&mut block) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(IndexError::io(path, e)),
            };
            hasher.update(&block[..n]);
        }
        Ok(Fingerprint(*hasher.finalize().as_bytes()))
    }

    /// Documents in `listing` that are new or whose content changed, in
    /// lexicographic order of document id. When an id is listed twice, the
    /// first entry wins.
    pub fn detect_changes(&self, listing: &[CorpusEntry]) -> Result<Vec<ChangedDocument>> {
        let mut sorted: Vec<&CorpusEntry> = listing.iter().collect();
        sorted.sort_by(|a, b| a.document_id.cmp(&b.document_id));

        let mut seen = HashSet::new();
        let mut changed = Vec::new();
        for entry in sorted {
            if !seen.insert(entry.document_id.as_str()) {
                warn!(
                    "Duplicate document id {} ({}); keeping the first entry",
                    entry.document_id,
                    entry.path.display()
                );
                continue;
            }

            let fingerprint = Self::hash_of(&entry.path)?;
            match self.fingerprints.get(&entry.document_id) {
                Some(known) if *known == fingerprint => {}
                previous => {
                    debug!(
                        "{} {}",
                        if previous.is_some() { "Modified" } else { "New" },
                        entry.document_id
                    );
                    changed.push(ChangedDocument {
                        document_id: entry.document_id.clone(),
                        path: entry.path.clone(),
                        fingerprint,
                    });
                }
            }
        }
        Ok(changed)
    }

    /// Ledger ids that no longer appear in `listing`, sorted.
    pub fn missing(&self, listing: &[CorpusEntry]) -> Vec<String> {
        let listed: HashSet<&str> = listing.iter().map(|e| e.document_id.as_str()).collect();
        self.fingerprints
            .keys()
            .filter(|id| !listed.contains(id.as_str()))
            .cloned()
            .collect()
    }

    /// Record `fingerprint` as the indexed content of `document_id`.
    /// Nothing is written until [`save`](Self::save).
    pub fn commit(&mut self, document_id: impl Into<String>, fingerprint: Fingerprint) {
        self.fingerprints.insert(document_id.into(), fingerprint);
    }

    /// Forget every fingerprint.
    pub fn reset(&mut self) {
        self.fingerprints.clear();
    }

    /// Atomically write the ledger.
    pub fn save(&self) -> Result<()> {
        let hex: BTreeMap<&str, String> = self
            .fingerprints
            .iter()
            .map(|(id, fp)| (id.as_str(), fp.to_hex()))
            .collect();
        let mut json = serde_json::to_string_pretty(&hex).map_err(|e| IndexError::Ledger {
            path: self.ledger_path.clone(),
            reason: e.to_string(),
        })?;
        json.push('\n');
        write_atomic(&self.ledger_path, json.as_bytes())?;
        debug!(
            "Saved {} fingerprints to {}",
            self.fingerprints.len(),
            self.ledger_path.display()
        );
        Ok(())
    }

    pub fn fingerprint(&self, document_id: &str) -> Option<&Fingerprint> {
        self.fingerprints.get(document_id)
    }

    pub fn ledger_path(&self) -> &Path {
        &self.ledger_path
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }
}

fn parse_ledger(path: &Path, contents: &str) -> Result<BTreeMap<String, Fingerprint>> {
    let malformed = |reason: String| IndexError::Ledger {
        path: path.to_path_buf(),
        reason,
    };

    let raw: BTreeMap<String, String> =
        serde_json::from_str(contents).map_err(|e| malformed(e.to_string()))?;
    raw.into_iter()
        .map(|(id, digest)| match Fingerprint::from_hex(&digest) {
            Some(fp) => Ok((id, fp)),
            None => Err(malformed(format!("invalid digest {digest:?} for {id}"))),
        })
        .collect()
}
