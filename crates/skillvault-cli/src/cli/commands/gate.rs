//! `skillvault gate` - emit the PolicyDecision for a receipt or a bundle.
//!
//! With `--receipt` the embedded scan is reused and the bundle is never
//! rehashed.

use skillvault_core::receipt::apply_scan_error_override;
use skillvault_core::verify::load_receipt;
use skillvault_core::{evaluate, scan_path, PolicyDecision, ScanReport};

use super::{eval_options, load_policy_args, run_or_report};
use crate::cli::args::GateArgs;
use crate::exit_codes::from_verdict;
use crate::output::{emit, findings_lines, kv_table};

pub fn run(args: GateArgs) -> anyhow::Result<i32> {
    run_or_report(execute(args))
}

fn execute(args: GateArgs) -> skillvault_core::Result<i32> {
    let policy = load_policy_args(&args.policy)?;

    let report: ScanReport = match (&args.receipt, &args.bundle) {
        (Some(receipt_path), _) => load_receipt(receipt_path)?.to_scan_report(),
        (None, Some(bundle_path)) => scan_path(bundle_path)?,
        (None, None) => unreachable!("clap enforces receipt or bundle"),
    };

    let mut decision = evaluate(&policy, &report, &eval_options(&args.approve));
    apply_scan_error_override(&report, &mut decision);

    emit(&args.output, &decision, || render(&decision))?;
    Ok(from_verdict(decision.verdict))
}

fn render(decision: &PolicyDecision) -> String {
    let mut out = kv_table(&[
        ("Verdict", decision.verdict.to_string()),
        (
            "Risk",
            format!(
                "base {} / total {}",
                decision.risk_score.base_risk, decision.risk_score.total
            ),
        ),
        (
            "Thresholds",
            format!(
                "pass<={} warn<={} fail<={}",
                decision.thresholds.pass_max,
                decision.thresholds.warn_max,
                decision.thresholds.fail_max
            ),
        ),
        (
            "Max risk gate",
            decision.gates.max_risk_score.to_string(),
        ),
    ]);

    if !decision.findings.is_empty() {
        out.push_str("Findings:\n");
        out.push_str(&findings_lines(&decision.findings));
    }
    out
}
