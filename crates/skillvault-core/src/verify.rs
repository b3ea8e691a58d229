//! Receipt verification.
//!
//! Verification re-derives everything the receipt claims: the bundle hash,
//! every file hash, the policy decision, and (when a public key is
//! available) the Ed25519 signature over the canonical payload.

use std::collections::BTreeMap;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::bundle::SkillBundle;
use crate::canonical;
use crate::error::{Error, Result};
use crate::finding::{sort_findings, Finding, ReasonCode, Severity, CONTRACT_VERSION};
use crate::hash::{compute_bundle_sha256, hash_bundle_files, sha256_hex};
use crate::policy::{evaluate, EvalOptions, Policy};
use crate::receipt::{apply_scan_error_override, Receipt, SIGNATURE_ALG};

/// How to resolve the signature trust anchor.
#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    pub pubkey: Option<VerifyingKey>,
    /// Only asserts the no-network posture; signature checks are always
    /// local.
    pub offline: bool,
}

/// Outcome of a signature check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureCheck {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    pub payload_sha256: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Machine-readable verification report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyReport {
    pub contract_version: String,
    pub ok: bool,
    pub bundle_sha256: String,
    pub findings: Vec<Finding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureCheck>,
}

/// Parse a receipt file.
pub fn load_receipt(path: &Path) -> Result<Receipt> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::ReceiptParse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&text).map_err(|e| Error::ReceiptParse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Verify a receipt against a bundle and a policy.
pub fn verify_receipt(
    receipt: &Receipt,
    bundle: &SkillBundle,
    policy: &Policy,
    options: &VerifyOptions,
) -> Result<VerifyReport> {
    let mut findings = Vec::new();

    // 1. Bundle hash.
    let actual_files = hash_bundle_files(&bundle.files);
    let actual_bundle_sha256 = compute_bundle_sha256(&actual_files);
    if actual_bundle_sha256 != receipt.bundle_sha256 {
        findings.push(
            Finding::new(
                ReasonCode::BundleHashMismatch,
                Severity::Error,
                "Bundle hash does not match the receipt",
            )
            .with_details(json!({
                "expected": receipt.bundle_sha256,
                "actual": actual_bundle_sha256,
            })),
        );
    }

    // 2. Per-file deltas.
    let actual_by_path: BTreeMap<&str, &crate::hash::FileEntry> =
        actual_files.iter().map(|e| (e.path.as_str(), e)).collect();
    let receipt_by_path: BTreeMap<&str, &crate::hash::FileEntry> =
        receipt.files.iter().map(|e| (e.path.as_str(), e)).collect();

    for (path, expected) in &receipt_by_path {
        match actual_by_path.get(path) {
            None => {
                findings.push(
                    Finding::new(
                        ReasonCode::FileMissing,
                        Severity::Error,
                        "File listed in the receipt is absent from the bundle",
                    )
                    .with_path(*path),
                );
            }
            Some(actual) => {
                if actual.sha256 != expected.sha256 || actual.size != expected.size {
                    findings.push(
                        Finding::new(
                            ReasonCode::FileHashMismatch,
                            Severity::Error,
                            "File content differs from the receipt",
                        )
                        .with_path(*path)
                        .with_details(json!({
                            "expected": {"sha256": expected.sha256, "size": expected.size},
                            "actual": {"sha256": actual.sha256, "size": actual.size},
                        })),
                    );
                }
            }
        }
    }
    for path in actual_by_path.keys() {
        if !receipt_by_path.contains_key(path) {
            findings.push(
                Finding::new(
                    ReasonCode::FileExtra,
                    Severity::Error,
                    "Bundle contains a file the receipt does not list",
                )
                .with_path(*path),
            );
        }
    }

    // 3. Policy re-evaluation from the embedded scan. Approvals recorded in
    // the receipt are replayed so a legitimately approved receipt verifies
    // without re-supplying flags.
    let report = receipt.to_scan_report();
    let eval_options = EvalOptions {
        approvals: receipt.recorded_approvals(),
    };
    let mut recomputed = evaluate(policy, &report, &eval_options);
    apply_scan_error_override(&report, &mut recomputed);

    if recomputed.verdict != receipt.policy.verdict {
        findings.push(
            Finding::new(
                ReasonCode::PolicyViolation,
                Severity::Error,
                "Re-evaluated policy verdict differs from the receipt",
            )
            .with_details(json!({
                "embedded": receipt.policy.verdict,
                "recomputed": recomputed.verdict,
            })),
        );
    } else if finding_keys(&recomputed.findings) != finding_keys(&receipt.policy.findings) {
        findings.push(
            Finding::new(
                ReasonCode::PolicyViolation,
                Severity::Error,
                "Re-evaluated policy findings differ from the receipt",
            )
            .with_details(json!({
                "embedded": finding_keys(&receipt.policy.findings),
                "recomputed": finding_keys(&recomputed.findings),
            })),
        );
    }

    // 4. Signature.
    let signature = match (&receipt.signature, &options.pubkey) {
        (Some(sig), Some(key)) => Some(check_signature(receipt, sig, key)?),
        _ => None,
    };

    sort_findings(&mut findings);
    let ok = findings.is_empty() && signature.as_ref().map_or(true, |s| s.valid);

    Ok(VerifyReport {
        contract_version: CONTRACT_VERSION.into(),
        ok,
        bundle_sha256: actual_bundle_sha256,
        findings,
        signature,
    })
}

/// Verify only the signature of a receipt (no bundle access).
pub fn verify_signature(receipt: &Receipt, key: &VerifyingKey) -> Result<SignatureCheck> {
    let signature = receipt
        .signature
        .as_ref()
        .ok_or_else(|| Error::SignatureInvalid("receipt is not signed".into()))?;
    check_signature(receipt, signature, key)
}

fn check_signature(
    receipt: &Receipt,
    signature: &crate::receipt::ReceiptSignature,
    key: &VerifyingKey,
) -> Result<SignatureCheck> {
    let mut check = SignatureCheck {
        key_id: signature.key_id.clone(),
        payload_sha256: signature.payload_sha256.clone(),
        valid: false,
        reason: None,
    };

    if signature.alg != SIGNATURE_ALG {
        check.reason = Some(format!(
            "unsupported signature algorithm '{}'",
            signature.alg
        ));
        return Ok(check);
    }

    let mut unsigned = receipt.clone();
    unsigned.signature = None;
    let payload = canonical::to_vec(&unsigned)?;

    let computed_sha = sha256_hex(&payload);
    if computed_sha != signature.payload_sha256 {
        check.reason = Some(format!(
            "payload_sha256 mismatch: computed {computed_sha}, claimed {}",
            signature.payload_sha256
        ));
        return Ok(check);
    }

    let sig_bytes = match BASE64.decode(&signature.sig) {
        Ok(bytes) => bytes,
        Err(e) => {
            check.reason = Some(format!("invalid base64 signature: {e}"));
            return Ok(check);
        }
    };
    let sig = match ed25519_dalek::Signature::from_slice(&sig_bytes) {
        Ok(sig) => sig,
        Err(e) => {
            check.reason = Some(format!("invalid signature bytes: {e}"));
            return Ok(check);
        }
    };

    match key.verify(&payload, &sig) {
        Ok(()) => check.valid = true,
        Err(_) => check.reason = Some("signature verification failed".into()),
    }
    Ok(check)
}

fn finding_keys(findings: &[Finding]) -> Vec<String> {
    let mut keys: Vec<String> = findings.iter().map(|f| f.delta_key()).collect();
    keys.sort();
    keys
}
