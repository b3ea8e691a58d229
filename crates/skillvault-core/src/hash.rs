//! Content-addressed hashing.
//!
//! The bundle hash folds `path ‖ 0x0A ‖ file_sha256_hex ‖ 0x0A` for every
//! entry into one SHA-256 context, after sorting entries by raw path bytes.
//! Byte comparison is load-bearing: locale- or code-point-aware collation
//! would break cross-platform determinism.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::bundle::BundleFile;

/// SHA-256 of empty input; also the sentinel manifest hash.
pub const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// One hashed bundle file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub size: u64,
    pub sha256: String,
}

/// Lowercase hex SHA-256.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Hash every file and return entries sorted by path bytes.
pub fn hash_bundle_files(files: &[BundleFile]) -> Vec<FileEntry> {
    let mut entries: Vec<FileEntry> = files
        .iter()
        .map(|f| FileEntry {
            path: f.path.clone(),
            size: f.bytes.len() as u64,
            sha256: sha256_hex(&f.bytes),
        })
        .collect();
    entries.sort_by(|a, b| a.path.as_bytes().cmp(b.path.as_bytes()));
    entries
}

/// Deterministic bundle hash. Invariant under any permutation of `entries`;
/// the empty bundle hashes to `SHA-256("")`.
pub fn compute_bundle_sha256(entries: &[FileEntry]) -> String {
    let mut sorted: Vec<&FileEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.path.as_bytes().cmp(b.path.as_bytes()));

    let mut hasher = Sha256::new();
    for entry in sorted {
        hasher.update(entry.path.as_bytes());
        hasher.update(b"\n");
        hasher.update(entry.sha256.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
