//! Normalized ZIP export (`strict_v0` profile).
//!
//! The archive is bit-stable: entries sorted by path bytes, POSIX names, no
//! directory entries, fixed DOS timestamp and unix mode, fixed compression.
//! Bundles with symlinks or a manifest-count violation are rejected before
//! anything is written.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::bundle::SkillBundle;
use crate::error::Result;
use crate::finding::{sort_findings, Finding, ReasonCode, Severity};
use crate::hash::hash_bundle_files;
use crate::manifest::detect_manifest;

/// The only export profile currently defined.
pub const PROFILE_STRICT_V0: &str = "strict_v0";

/// Validate a bundle against the strict profile. Empty means exportable.
pub fn strict_findings(bundle: &SkillBundle) -> Vec<Finding> {
    let mut findings = bundle.findings.clone();

    for symlink in &bundle.symlinks {
        findings.push(
            Finding::new(
                ReasonCode::ConstraintSymlinkForbidden,
                Severity::Error,
                "Symbolic links are forbidden in strict export",
            )
            .with_path(symlink.clone()),
        );
    }

    let entries = hash_bundle_files(&bundle.files);
    let (_, manifest_finding) = detect_manifest(&entries);
    if let Some(finding) = manifest_finding {
        findings.push(finding);
    }

    sort_findings(&mut findings);
    findings
}

/// Write the normalized archive. Returns the rejection findings instead of
/// writing when the bundle violates the strict profile.
pub fn export_strict(bundle: &SkillBundle, out: &Path) -> Result<Vec<Finding>> {
    let findings = strict_findings(bundle);
    if !findings.is_empty() {
        return Ok(findings);
    }

    let mut sorted: Vec<&crate::bundle::BundleFile> = bundle.files.iter().collect();
    sorted.sort_by(|a, b| a.path.as_bytes().cmp(b.path.as_bytes()));

    let file = File::create(out)?;
    let mut zip = zip::ZipWriter::new(file);
    // DateTime::default() is the DOS epoch (1980-01-01 00:00:00); together
    // with a fixed mode and compression level the archive bytes are stable
    // across platforms and runs.
    let options = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);

    for entry in sorted {
        zip.start_file(&entry.path, options)
            .map_err(|e| crate::error::Error::ZipWrite {
                path: out.to_path_buf(),
                reason: e.to_string(),
            })?;
        zip.write_all(&entry.bytes)?;
    }
    zip.finish().map_err(|e| crate::error::Error::ZipWrite {
        path: out.to_path_buf(),
        reason: e.to_string(),
    })?;

    tracing::debug!(files = bundle.files.len(), out = %out.display(), "strict export written");
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::reader::read_bundle;
    use crate::bundle::{BundleFile, BundleKind};

    fn bundle(files: Vec<(&str, &str)>) -> SkillBundle {
        SkillBundle {
            kind: BundleKind::Directory,
            source_path: "test".into(),
            files: files
                .into_iter()
                .map(|(path, content)| BundleFile {
                    path: path.into(),
                    bytes: content.as_bytes().to_vec(),
                })
                .collect(),
            symlinks: Vec::new(),
            findings: Vec::new(),
        }
    }

    #[test]
    fn export_is_byte_stable_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = bundle(vec![
            ("SKILL.md", "# s\n"),
            ("b.txt", "bee\n"),
            ("a/nested.txt", "nested\n"),
        ]);

        let out1 = dir.path().join("one.zip");
        let out2 = dir.path().join("two.zip");
        assert!(export_strict(&bundle, &out1).unwrap().is_empty());
        assert!(export_strict(&bundle, &out2).unwrap().is_empty());

        let bytes1 = std::fs::read(&out1).unwrap();
        let bytes2 = std::fs::read(&out2).unwrap();
        assert_eq!(bytes1, bytes2);
    }

    #[test]
    fn exported_zip_reads_back_identically() {
        let dir = tempfile::tempdir().unwrap();
        let original = bundle(vec![("SKILL.md", "# s\n"), ("tool.js", "console.log(1)\n")]);
        let out = dir.path().join("skill.zip");
        assert!(export_strict(&original, &out).unwrap().is_empty());

        let reread = read_bundle(&out).unwrap();
        assert_eq!(reread.files.len(), original.files.len());
        for (a, b) in original.files.iter().zip(reread.files.iter()) {
            assert_eq!(a.path, b.path);
            assert_eq!(a.bytes, b.bytes);
        }
    }

    #[test]
    fn manifest_violation_rejects_export() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("skill.zip");
        let findings = export_strict(&bundle(vec![("tool.js", "1\n")]), &out).unwrap();

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].code, ReasonCode::ConstraintManifestCount);
        assert!(!out.exists());
    }

    #[test]
    fn symlinks_reject_export() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("skill.zip");
        let mut bundle = bundle(vec![("SKILL.md", "# s\n")]);
        bundle.symlinks.push("link.txt".into());

        let findings = export_strict(&bundle, &out).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].code, ReasonCode::ConstraintSymlinkForbidden);
        assert_eq!(findings[0].path.as_deref(), Some("link.txt"));
        assert!(!out.exists());
    }

    #[test]
    fn unsafe_archive_findings_propagate() {
        let mut bundle = bundle(vec![("SKILL.md", "# s\n")]);
        bundle.findings.push(
            Finding::new(
                ReasonCode::ConstraintUnsafePath,
                Severity::Error,
                "Archive entry escapes bundle root: ../x",
            )
            .with_path("../x"),
        );
        let findings = strict_findings(&bundle);
        assert_eq!(findings[0].code, ReasonCode::ConstraintUnsafePath);
    }
}
