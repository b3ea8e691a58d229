//! Scan orchestration: bundle in, `ScanReport` out.
//!
//! A scan is a pure function of the bundle bytes. Reports carry no
//! timestamps and no machine state, so two scans of identical bytes are
//! byte-identical regardless of platform or enumeration order.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bundle::reader::read_bundle;
use crate::bundle::SkillBundle;
use crate::capability::{infer_capabilities, Capability};
use crate::error::Result;
use crate::finding::{sort_findings, Finding, Severity, CONTRACT_VERSION};
use crate::hash::{compute_bundle_sha256, hash_bundle_files, FileEntry};
use crate::manifest::{detect_manifest, ManifestRef};
use crate::normalize::normalize_content;
use crate::risk::{score, RiskScore};

/// Aggregate counters for a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub files: u64,
    pub bytes: u64,
    /// Approximate manifest size in tokens (ceil of normalized chars / 4),
    /// recorded here so token gates work from a receipt alone.
    pub manifest_tokens: u64,
    pub errors: u64,
    pub warnings: u64,
    pub infos: u64,
}

/// Everything a scan derives from a bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub contract_version: String,
    pub bundle_sha256: String,
    pub files: Vec<FileEntry>,
    pub manifest: ManifestRef,
    pub capabilities: Vec<Capability>,
    pub risk_score: RiskScore,
    pub summary: ScanSummary,
    pub findings: Vec<Finding>,
}

impl ScanReport {
    pub fn has_error_findings(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Error)
    }
}

/// Read and scan a bundle path.
pub fn scan_path(path: &Path) -> Result<ScanReport> {
    let bundle = read_bundle(path)?;
    Ok(scan_bundle(&bundle))
}

/// Scan an already-ingested bundle.
pub fn scan_bundle(bundle: &SkillBundle) -> ScanReport {
    let files = hash_bundle_files(&bundle.files);
    let bundle_sha256 = compute_bundle_sha256(&files);

    let (manifest, manifest_finding) = detect_manifest(&files);

    let mut findings = bundle.findings.clone();
    if let Some(finding) = manifest_finding {
        findings.push(finding);
    }
    sort_findings(&mut findings);

    let capabilities = infer_capabilities(&bundle.files);
    let risk_score = score(&capabilities, &findings);

    let manifest_tokens = if manifest.is_sentinel() {
        0
    } else {
        bundle
            .file(&manifest.path)
            .map(|f| approximate_tokens(&normalize_content(&f.bytes)))
            .unwrap_or(0)
    };

    let summary = ScanSummary {
        files: files.len() as u64,
        bytes: bundle.total_bytes(),
        manifest_tokens,
        errors: count_severity(&findings, Severity::Error),
        warnings: count_severity(&findings, Severity::Warn),
        infos: count_severity(&findings, Severity::Info),
    };

    tracing::debug!(
        files = summary.files,
        capabilities = capabilities.len(),
        base_risk = risk_score.base_risk,
        "scan complete"
    );

    ScanReport {
        contract_version: CONTRACT_VERSION.into(),
        bundle_sha256,
        files,
        manifest,
        capabilities: capabilities.into_iter().collect(),
        risk_score,
        summary,
        findings,
    }
}

/// Rough 4-chars-per-token estimate over normalized text.
fn approximate_tokens(normalized: &str) -> u64 {
    let chars = normalized.chars().count() as u64;
    chars.div_ceil(4)
}

fn count_severity(findings: &[Finding], severity: Severity) -> u64 {
    findings.iter().filter(|f| f.severity == severity).count() as u64
}
