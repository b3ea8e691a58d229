//! `skillvault receipt` - scan, gate, assemble and optionally sign.

use skillvault_core::keys::{key_id_for, load_signing_key};
use skillvault_core::receipt::{build_receipt, sign_receipt};
use skillvault_core::{evaluate, scan_path, Receipt};

use super::{eval_options, load_policy_args, run_or_report};
use crate::cli::args::ReceiptArgs;
use crate::exit_codes::from_verdict;
use crate::output::{emit, findings_lines, kv_table};

pub fn run(args: ReceiptArgs) -> anyhow::Result<i32> {
    run_or_report(execute(args))
}

fn execute(args: ReceiptArgs) -> skillvault_core::Result<i32> {
    let policy = load_policy_args(&args.policy)?;
    let report = scan_path(&args.bundle)?;
    let decision = evaluate(&policy, &report, &eval_options(&args.approve));
    let mut receipt = build_receipt(report, decision, args.deterministic);

    if let Some(key_path) = &args.signing_key {
        let key = load_signing_key(key_path)?;
        let key_id = match &args.key_id {
            Some(id) => Some(id.clone()),
            None => Some(key_id_for(&key.verifying_key())?),
        };
        sign_receipt(&mut receipt, &key, key_id)?;
    }

    emit(&args.output, &receipt, || render(&receipt))?;
    Ok(from_verdict(receipt.policy.verdict))
}

fn render(receipt: &Receipt) -> String {
    let signature = match &receipt.signature {
        Some(sig) => format!(
            "{} ({})",
            sig.alg,
            sig.key_id.as_deref().unwrap_or("no key id")
        ),
        None => "(unsigned)".to_string(),
    };

    let mut out = kv_table(&[
        ("Verdict", receipt.policy.verdict.to_string()),
        ("Created", receipt.created_at.clone()),
        (
            "Scanner",
            format!("{}/{}", receipt.scanner.name, receipt.scanner.version),
        ),
        ("SHA-256", receipt.bundle_sha256.clone()),
        (
            "Risk",
            format!(
                "base {} / total {}",
                receipt.scan.risk_score.base_risk, receipt.scan.risk_score.total
            ),
        ),
        ("Signature", signature),
    ]);

    if !receipt.scan.findings.is_empty() {
        out.push_str("Scan findings:\n");
        out.push_str(&findings_lines(&receipt.scan.findings));
    }
    if !receipt.policy.findings.is_empty() {
        out.push_str("Policy findings:\n");
        out.push_str(&findings_lines(&receipt.policy.findings));
    }
    out
}
