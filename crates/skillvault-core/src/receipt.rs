//! Receipt assembly and signing.
//!
//! A receipt embeds the scan and the policy decision, stamps provenance,
//! and optionally carries an Ed25519 signature over the canonical JSON of
//! the receipt with the `signature` field absent. Mutating any signed field
//! invalidates the signature by construction.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Serialize};

use crate::canonical;
use crate::capability::Capability;
use crate::error::Result;
use crate::finding::{
    sort_findings, Finding, ReasonCode, Severity, Verdict, CONTRACT_VERSION,
};
use crate::hash::{sha256_hex, FileEntry};
use crate::manifest::ManifestRef;
use crate::policy::PolicyDecision;
use crate::risk::RiskScore;
use crate::scan::{ScanReport, ScanSummary};

/// Frozen `created_at` used in deterministic mode.
pub const DETERMINISTIC_CREATED_AT: &str = "1970-01-01T00:00:00.000Z";

pub const SIGNATURE_ALG: &str = "ed25519";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerInfo {
    pub name: String,
    pub version: String,
}

impl Default for ScannerInfo {
    fn default() -> Self {
        Self {
            name: "skillvault".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

/// The scan section of a receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanBlock {
    pub capabilities: Vec<Capability>,
    pub risk_score: RiskScore,
    pub summary: ScanSummary,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptSignature {
    pub alg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    pub payload_sha256: String,
    pub sig: String,
}

/// Signed, reproducible trust artifact for a bundle at a moment in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub contract_version: String,
    pub created_at: String,
    pub scanner: ScannerInfo,
    pub bundle_sha256: String,
    pub files: Vec<FileEntry>,
    pub manifest: ManifestRef,
    pub scan: ScanBlock,
    pub policy: PolicyDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<ReceiptSignature>,
}

impl Receipt {
    /// Reconstruct the scan report this receipt embeds, for re-evaluation
    /// without touching the bundle.
    pub fn to_scan_report(&self) -> ScanReport {
        ScanReport {
            contract_version: self.contract_version.clone(),
            bundle_sha256: self.bundle_sha256.clone(),
            files: self.files.clone(),
            manifest: self.manifest.clone(),
            capabilities: self.scan.capabilities.clone(),
            risk_score: self.scan.risk_score,
            summary: self.scan.summary,
            findings: self.scan.findings.clone(),
        }
    }

    /// Capabilities whose `require_approval` gate was recorded as satisfied
    /// when this receipt was built. Re-evaluations replay these so an
    /// approved receipt does not need the flags supplied again.
    pub fn recorded_approvals(&self) -> std::collections::BTreeSet<Capability> {
        self.policy
            .findings
            .iter()
            .filter(|f| {
                f.code == ReasonCode::PolicyApprovalRequired && f.severity == Severity::Info
            })
            .filter_map(|f| {
                f.details
                    .as_ref()
                    .and_then(|d| d.get("capability"))
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.parse().ok())
            })
            .collect()
    }

    /// Canonical bytes of the receipt with `signature` absent: the signing
    /// payload.
    pub fn payload_bytes(&self) -> Result<Vec<u8>> {
        if self.signature.is_none() {
            return canonical::to_vec(self);
        }
        let mut unsigned = self.clone();
        unsigned.signature = None;
        canonical::to_vec(&unsigned)
    }
}

/// `created_at` for a new receipt.
pub fn created_at(deterministic: bool) -> String {
    if deterministic {
        DETERMINISTIC_CREATED_AT.into()
    } else {
        chrono::Utc::now()
            .format("%Y-%m-%dT%H:%M:%S%.3fZ")
            .to_string()
    }
}

/// Apply the scan-error override to a decision: any error-severity scan
/// finding forces FAIL and appends `POLICY_SCAN_ERROR_FINDING`. Supersedes
/// whatever the gates decided.
pub fn apply_scan_error_override(report: &ScanReport, decision: &mut PolicyDecision) {
    let errors = report
        .findings
        .iter()
        .filter(|f| f.severity == Severity::Error)
        .count();
    if errors == 0 {
        return;
    }
    decision.verdict = Verdict::Fail;
    decision.findings.push(
        Finding::new(
            ReasonCode::PolicyScanErrorFinding,
            Severity::Error,
            format!("Scan produced {errors} error finding(s); verdict forced to FAIL"),
        )
        .with_details(serde_json::json!({"error_findings": errors})),
    );
    sort_findings(&mut decision.findings);
}

/// Assemble an unsigned receipt from a scan and a decision.
pub fn build_receipt(
    report: ScanReport,
    mut decision: PolicyDecision,
    deterministic: bool,
) -> Receipt {
    apply_scan_error_override(&report, &mut decision);

    Receipt {
        contract_version: CONTRACT_VERSION.into(),
        created_at: created_at(deterministic),
        scanner: ScannerInfo::default(),
        bundle_sha256: report.bundle_sha256,
        files: report.files,
        manifest: report.manifest,
        scan: ScanBlock {
            capabilities: report.capabilities,
            risk_score: report.risk_score,
            summary: report.summary,
            findings: report.findings,
        },
        policy: decision,
        signature: None,
    }
}

/// Sign a receipt in place. The payload is the canonical JSON of the
/// signature-less receipt; the signature covers the payload bytes, not the
/// hash. Ed25519 is deterministic: same receipt + same key = same sig.
pub fn sign_receipt(
    receipt: &mut Receipt,
    key: &SigningKey,
    key_id: Option<String>,
) -> Result<()> {
    receipt.signature = None;
    let payload = receipt.payload_bytes()?;
    let payload_sha256 = sha256_hex(&payload);
    let signature = key.sign(&payload);

    receipt.signature = Some(ReceiptSignature {
        alg: SIGNATURE_ALG.into(),
        key_id,
        payload_sha256,
        sig: BASE64.encode(signature.to_bytes()),
    });
    Ok(())
}
