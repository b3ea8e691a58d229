//! Root manifest detection.
//!
//! A bundle must carry exactly one root-level `SKILL.md` or `skill.md`
//! (either spelling, but nothing else). Any other count yields an error
//! finding and the sentinel ref, so downstream consumers never see an
//! absent manifest field.

use serde::{Deserialize, Serialize};

use crate::finding::{Finding, ReasonCode, Severity};
use crate::hash::{FileEntry, EMPTY_SHA256};

pub const MANIFEST_NAMES: [&str; 2] = ["SKILL.md", "skill.md"];

/// Reference to the bundle manifest (or the sentinel).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRef {
    pub path: String,
    pub size: u64,
    pub sha256: String,
}

impl ManifestRef {
    /// Sentinel for bundles without exactly one root manifest.
    pub fn sentinel() -> Self {
        Self {
            path: "SKILL.md".into(),
            size: 0,
            sha256: EMPTY_SHA256.into(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.size == 0 && self.sha256 == EMPTY_SHA256
    }
}

/// Select the manifest from hashed entries. Returns the manifest ref and,
/// when the count rule is violated, the finding to record.
pub fn detect_manifest(entries: &[FileEntry]) -> (ManifestRef, Option<Finding>) {
    let candidates: Vec<&FileEntry> = entries
        .iter()
        .filter(|e| !e.path.contains('/') && MANIFEST_NAMES.contains(&e.path.as_str()))
        .collect();

    if candidates.len() == 1 {
        let entry = candidates[0];
        (
            ManifestRef {
                path: entry.path.clone(),
                size: entry.size,
                sha256: entry.sha256.clone(),
            },
            None,
        )
    } else {
        let finding = Finding::new(
            ReasonCode::ConstraintManifestCount,
            Severity::Error,
            format!(
                "Expected exactly one manifest (SKILL.md or skill.md) in bundle root; found {}",
                candidates.len()
            ),
        );
        (ManifestRef::sentinel(), Some(finding))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha256_hex;

    fn entry(path: &str, content: &[u8]) -> FileEntry {
        FileEntry {
            path: path.into(),
            size: content.len() as u64,
            sha256: sha256_hex(content),
        }
    }

    #[test]
    fn single_root_manifest_is_selected() {
        let entries = vec![entry("SKILL.md", b"# skill\n"), entry("tool.js", b"x")];
        let (manifest, finding) = detect_manifest(&entries);
        assert_eq!(manifest.path, "SKILL.md");
        assert_eq!(manifest.size, 8);
        assert!(finding.is_none());
    }

    #[test]
    fn lowercase_spelling_is_accepted() {
        let entries = vec![entry("skill.md", b"# skill\n")];
        let (manifest, finding) = detect_manifest(&entries);
        assert_eq!(manifest.path, "skill.md");
        assert!(finding.is_none());
    }

    #[test]
    fn nested_manifest_does_not_count() {
        let entries = vec![entry("docs/SKILL.md", b"# nested\n"), entry("tool.js", b"x")];
        let (manifest, finding) = detect_manifest(&entries);
        assert!(manifest.is_sentinel());
        let finding = finding.unwrap();
        assert_eq!(finding.code, ReasonCode::ConstraintManifestCount);
        assert!(finding.message.ends_with("found 0"));
    }

    #[test]
    fn both_spellings_violate_the_count_rule() {
        let entries = vec![entry("SKILL.md", b"a"), entry("skill.md", b"b")];
        let (manifest, finding) = detect_manifest(&entries);
        assert!(manifest.is_sentinel());
        let finding = finding.unwrap();
        assert_eq!(finding.severity, Severity::Error);
        assert!(finding.message.ends_with("found 2"));
    }

    #[test]
    fn sentinel_hashes_empty_input() {
        let (manifest, _) = detect_manifest(&[]);
        assert_eq!(manifest.path, "SKILL.md");
        assert_eq!(manifest.size, 0);
        assert_eq!(manifest.sha256, EMPTY_SHA256);
    }

    #[test]
    fn other_case_variants_are_not_manifests() {
        let entries = vec![entry("Skill.md", b"x"), entry("SKILL.MD", b"y")];
        let (manifest, finding) = detect_manifest(&entries);
        assert!(manifest.is_sentinel());
        assert!(finding.is_some());
    }
}
