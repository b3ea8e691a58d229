//! Bundle ingestion and export.

pub mod export;
pub mod reader;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::finding::Finding;

/// How the bundle reached us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleKind {
    Directory,
    Zip,
}

/// One file inside a bundle. `path` is POSIX-relative: `/` separators, no
/// leading slash, no empty segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleFile {
    pub path: String,
    pub bytes: Vec<u8>,
}

/// An ingested bundle: files sorted by path bytes, plus everything the
/// reader had to refuse (hostile archive entries) or side-step (symlinks,
/// which are never followed but matter to strict export).
#[derive(Debug, Clone)]
pub struct SkillBundle {
    pub kind: BundleKind,
    pub source_path: PathBuf,
    pub files: Vec<BundleFile>,
    pub symlinks: Vec<String>,
    pub findings: Vec<Finding>,
}

impl SkillBundle {
    /// Total payload size in bytes.
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.bytes.len() as u64).sum()
    }

    /// Look up a file by exact path.
    pub fn file(&self, path: &str) -> Option<&BundleFile> {
        self.files.iter().find(|f| f.path == path)
    }
}
