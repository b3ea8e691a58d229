//! Diff engine: file, capability and finding deltas between two sources.
//!
//! Each side is either a receipt or a freshly scanned bundle; both reduce
//! to the same shape before diffing. All listings are bytewise sorted.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bundle::reader::read_bundle;
use crate::capability::Capability;
use crate::error::Result;
use crate::finding::{Finding, CONTRACT_VERSION};
use crate::hash::FileEntry;
use crate::policy::{evaluate, EvalOptions, Policy, PolicyDecision};
use crate::receipt::{apply_scan_error_override, Receipt};
use crate::scan::scan_bundle;
use crate::verify::load_receipt;

/// One side of a diff, reduced to comparable facts.
#[derive(Debug, Clone)]
pub struct DiffSource {
    pub label: String,
    pub bundle_sha256: String,
    pub files: Vec<FileEntry>,
    pub capabilities: Vec<Capability>,
    pub findings: Vec<Finding>,
}

impl DiffSource {
    /// A receipt contributes its scan findings. When a policy is supplied
    /// the embedded scan is re-gated under it (recorded approvals replayed),
    /// so both sides of a diff speak for the same policy epoch; without one
    /// the receipt's recorded decision is compared as-is.
    pub fn from_receipt(
        label: impl Into<String>,
        receipt: &Receipt,
        policy: Option<&Policy>,
    ) -> Self {
        let mut findings = receipt.scan.findings.clone();
        match policy {
            Some(policy) => {
                let report = receipt.to_scan_report();
                let options = EvalOptions {
                    approvals: receipt.recorded_approvals(),
                };
                findings.extend(gate_findings(policy, &report, &options));
            }
            None => findings.extend(receipt.policy.findings.iter().cloned()),
        }
        Self {
            label: label.into(),
            bundle_sha256: receipt.bundle_sha256.clone(),
            files: receipt.files.clone(),
            capabilities: receipt.scan.capabilities.clone(),
            findings,
        }
    }

    /// A bundle is scanned in-process; with a policy the gate findings join
    /// the comparison, mirroring what a receipt carries.
    pub fn from_bundle_path(path: &Path, policy: Option<&Policy>) -> Result<Self> {
        let bundle = read_bundle(path)?;
        let report = scan_bundle(&bundle);
        let mut findings = report.findings.clone();
        if let Some(policy) = policy {
            findings.extend(gate_findings(policy, &report, &EvalOptions::default()));
        }
        Ok(Self {
            label: path.display().to_string(),
            bundle_sha256: report.bundle_sha256,
            files: report.files,
            capabilities: report.capabilities,
            findings,
        })
    }

    /// Receipt file (`.json`) or bundle path.
    pub fn from_path(path: &Path, policy: Option<&Policy>) -> Result<Self> {
        let is_receipt = path.is_file()
            && path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_receipt {
            let receipt = load_receipt(path)?;
            Ok(Self::from_receipt(
                path.display().to_string(),
                &receipt,
                policy,
            ))
        } else {
            Self::from_bundle_path(path, policy)
        }
    }
}

/// Gate a scan and return the decision findings, with the scan-error
/// override applied the same way the receipt builder does.
fn gate_findings(
    policy: &Policy,
    report: &crate::scan::ScanReport,
    options: &EvalOptions,
) -> Vec<Finding> {
    let mut decision: PolicyDecision = evaluate(policy, report, options);
    apply_scan_error_override(report, &mut decision);
    decision.findings
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDiff {
    pub path: String,
    pub change: ChangeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub a: Option<FileEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b: Option<FileEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub added: u64,
    pub removed: u64,
    pub modified: u64,
    pub unchanged: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDeltas {
    pub added: Vec<Capability>,
    pub removed: Vec<Capability>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingDeltas {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSide {
    pub source: String,
    pub bundle_sha256: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffReport {
    pub contract_version: String,
    pub a: DiffSide,
    pub b: DiffSide,
    pub file_diffs: Vec<FileDiff>,
    pub summary: DiffSummary,
    pub capability_deltas: CapabilityDeltas,
    pub finding_deltas: FindingDeltas,
}

impl DiffReport {
    pub fn is_empty(&self) -> bool {
        self.summary.added == 0
            && self.summary.removed == 0
            && self.summary.modified == 0
            && self.capability_deltas.added.is_empty()
            && self.capability_deltas.removed.is_empty()
            && self.finding_deltas.added.is_empty()
            && self.finding_deltas.removed.is_empty()
    }
}

/// Diff two sources.
pub fn diff_sources(a: &DiffSource, b: &DiffSource) -> DiffReport {
    let a_files: BTreeMap<&str, &FileEntry> =
        a.files.iter().map(|e| (e.path.as_str(), e)).collect();
    let b_files: BTreeMap<&str, &FileEntry> =
        b.files.iter().map(|e| (e.path.as_str(), e)).collect();

    // Union of paths, bytewise sorted by the BTreeSet.
    let paths: BTreeSet<&str> = a_files.keys().chain(b_files.keys()).copied().collect();

    let mut file_diffs = Vec::with_capacity(paths.len());
    let mut summary = DiffSummary {
        added: 0,
        removed: 0,
        modified: 0,
        unchanged: 0,
    };

    for path in paths {
        let (change, a_entry, b_entry) = match (a_files.get(path), b_files.get(path)) {
            (None, Some(b_entry)) => {
                summary.added += 1;
                (ChangeKind::Added, None, Some((*b_entry).clone()))
            }
            (Some(a_entry), None) => {
                summary.removed += 1;
                (ChangeKind::Removed, Some((*a_entry).clone()), None)
            }
            (Some(a_entry), Some(b_entry)) => {
                if a_entry.sha256 != b_entry.sha256 || a_entry.size != b_entry.size {
                    summary.modified += 1;
                    (
                        ChangeKind::Modified,
                        Some((*a_entry).clone()),
                        Some((*b_entry).clone()),
                    )
                } else {
                    summary.unchanged += 1;
                    (
                        ChangeKind::Unchanged,
                        Some((*a_entry).clone()),
                        Some((*b_entry).clone()),
                    )
                }
            }
            (None, None) => unreachable!("path came from the union"),
        };
        file_diffs.push(FileDiff {
            path: path.to_string(),
            change,
            a: a_entry,
            b: b_entry,
        });
    }

    let a_caps: BTreeSet<Capability> = a.capabilities.iter().copied().collect();
    let b_caps: BTreeSet<Capability> = b.capabilities.iter().copied().collect();
    let capability_deltas = CapabilityDeltas {
        added: b_caps.difference(&a_caps).copied().collect(),
        removed: a_caps.difference(&b_caps).copied().collect(),
    };

    let a_keys: BTreeSet<String> = a.findings.iter().map(Finding::delta_key).collect();
    let b_keys: BTreeSet<String> = b.findings.iter().map(Finding::delta_key).collect();
    let finding_deltas = FindingDeltas {
        added: b_keys.difference(&a_keys).cloned().collect(),
        removed: a_keys.difference(&b_keys).cloned().collect(),
    };

    DiffReport {
        contract_version: CONTRACT_VERSION.into(),
        a: DiffSide {
            source: a.label.clone(),
            bundle_sha256: a.bundle_sha256.clone(),
        },
        b: DiffSide {
            source: b.label.clone(),
            bundle_sha256: b.bundle_sha256.clone(),
        },
        file_diffs,
        summary,
        capability_deltas,
        finding_deltas,
    }
}
