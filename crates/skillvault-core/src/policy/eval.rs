//! Policy evaluation: scan report + policy → decision.

use std::collections::BTreeSet;

use serde_json::json;

use crate::capability::Capability;
use crate::finding::{
    sort_findings, Finding, ReasonCode, Severity, Thresholds, Verdict, CONTRACT_VERSION,
};
use crate::policy::{CapabilityMode, Policy, PolicyDecision};
use crate::scan::ScanReport;

/// Caller-supplied evaluation context.
#[derive(Debug, Clone, Default)]
pub struct EvalOptions {
    /// Capabilities explicitly approved for this invocation; satisfies
    /// `require_approval` gates.
    pub approvals: BTreeSet<Capability>,
}

/// Evaluate a policy over a scan. Verdict starts from the risk thresholds
/// and gates can only force it to FAIL; approvals are recorded either way.
pub fn evaluate(policy: &Policy, report: &ScanReport, options: &EvalOptions) -> PolicyDecision {
    let total = report.risk_score.total;
    let mut verdict = Verdict::from_total(total as f64);
    let mut findings: Vec<Finding> = Vec::new();

    if let Some(max_risk) = policy.max_risk_score {
        if total > max_risk {
            verdict = Verdict::Fail;
            findings.push(
                Finding::new(
                    ReasonCode::PolicyMaxRiskExceeded,
                    Severity::Error,
                    format!("Risk total {total} exceeds gates.max_risk_score {max_risk}"),
                )
                .with_details(json!({"max_risk_score": max_risk, "total": total})),
            );
        }
    }

    if let Some(allowed) = &policy.allow_verdicts {
        if !allowed.contains(&verdict) {
            let rejected = verdict;
            verdict = Verdict::Fail;
            findings.push(
                Finding::new(
                    ReasonCode::PolicyVerdictNotAllowed,
                    Severity::Error,
                    format!("Verdict {rejected} is not in gates.allow_verdicts"),
                )
                .with_details(json!({
                    "verdict": rejected,
                    "allow_verdicts": allowed.iter().copied().collect::<Vec<_>>(),
                })),
            );
        }
    }

    for capability in &report.capabilities {
        match policy.mode_for(*capability) {
            CapabilityMode::Allow => {}
            CapabilityMode::Block => {
                verdict = Verdict::Fail;
                findings.push(
                    Finding::new(
                        ReasonCode::PolicyCapabilityBlocked,
                        Severity::Error,
                        format!("Capability '{capability}' is blocked by policy"),
                    )
                    .with_details(json!({"capability": capability})),
                );
            }
            CapabilityMode::RequireApproval => {
                if options.approvals.contains(capability) {
                    findings.push(
                        Finding::new(
                            ReasonCode::PolicyApprovalRequired,
                            Severity::Info,
                            format!("Capability '{capability}' requires approval; approval supplied"),
                        )
                        .with_details(json!({"capability": capability, "approved": true})),
                    );
                } else {
                    verdict = Verdict::Fail;
                    findings.push(
                        Finding::new(
                            ReasonCode::RequiredApprovalMissing,
                            Severity::Error,
                            format!(
                                "Capability '{capability}' requires approval and none was supplied"
                            ),
                        )
                        .with_details(json!({"capability": capability, "approved": false})),
                    );
                }
            }
        }
    }

    let constraints = &policy.constraints;

    if constraints.exactly_one_manifest {
        if let Some(scan_finding) = report
            .findings
            .iter()
            .find(|f| f.code == ReasonCode::ConstraintManifestCount)
        {
            verdict = Verdict::Fail;
            findings.push(scan_finding.clone());
        }
    }

    if let Some(limit) = constraints.bundle_size_limit_bytes {
        let actual = report.summary.bytes;
        if actual > limit {
            verdict = Verdict::Fail;
            findings.push(
                Finding::new(
                    ReasonCode::ConstraintBundleSizeLimit,
                    Severity::Error,
                    format!("Bundle size {actual} bytes exceeds limit {limit}"),
                )
                .with_details(json!({"limit": limit, "actual": actual})),
            );
        }
    }

    if let Some(limit) = constraints.file_size_limit_bytes {
        for file in &report.files {
            if file.size > limit {
                verdict = Verdict::Fail;
                findings.push(
                    Finding::new(
                        ReasonCode::ConstraintFileSizeLimit,
                        Severity::Error,
                        format!("File size {} bytes exceeds limit {limit}", file.size),
                    )
                    .with_path(file.path.clone())
                    .with_details(json!({"limit": limit, "actual": file.size})),
                );
            }
        }
    }

    let tokens = report.summary.manifest_tokens;
    if let Some(limit) = constraints.max_manifest_tokens_fail {
        if tokens > limit {
            verdict = Verdict::Fail;
            findings.push(
                Finding::new(
                    ReasonCode::ConstraintTokenLimitFail,
                    Severity::Error,
                    format!("Manifest is ~{tokens} tokens, above the hard limit {limit}"),
                )
                .with_details(json!({"limit": limit, "actual": tokens})),
            );
        }
    }
    if let Some(limit) = constraints.max_manifest_tokens_warn {
        if tokens > limit {
            findings.push(
                Finding::new(
                    ReasonCode::ConstraintTokenLimitWarn,
                    Severity::Warn,
                    format!("Manifest is ~{tokens} tokens, above the soft limit {limit}"),
                )
                .with_details(json!({"limit": limit, "actual": tokens})),
            );
        }
    }

    sort_findings(&mut findings);

    PolicyDecision {
        contract_version: CONTRACT_VERSION.into(),
        verdict,
        thresholds: Thresholds::default(),
        gates: policy.effective_gates(),
        risk_score: report.risk_score,
        findings,
    }
}
