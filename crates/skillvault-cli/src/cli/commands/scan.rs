//! `skillvault scan` - emit the ScanReport for a bundle.

use skillvault_core::{scan_path, ScanReport};

use super::run_or_report;
use crate::cli::args::ScanArgs;
use crate::exit_codes::EXIT_SUCCESS;
use crate::output::{emit, findings_lines, kv_table};

pub fn run(args: ScanArgs) -> anyhow::Result<i32> {
    run_or_report(execute(args))
}

fn execute(args: ScanArgs) -> skillvault_core::Result<i32> {
    // Scan reports carry no timestamps; the flag is accepted for symmetry
    // with `receipt` and recorded for the logs.
    tracing::debug!(deterministic = args.deterministic, bundle = %args.bundle.display(), "scan");
    let report = scan_path(&args.bundle)?;
    emit(&args.output, &report, || render(&args, &report))?;
    Ok(EXIT_SUCCESS)
}

fn render(args: &ScanArgs, report: &ScanReport) -> String {
    let capabilities = if report.capabilities.is_empty() {
        "(none)".to_string()
    } else {
        report
            .capabilities
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut out = kv_table(&[
        ("Bundle", args.bundle.display().to_string()),
        ("SHA-256", report.bundle_sha256.clone()),
        (
            "Files",
            format!("{} ({} bytes)", report.summary.files, report.summary.bytes),
        ),
        ("Manifest", report.manifest.path.clone()),
        ("Capabilities", capabilities),
        (
            "Risk",
            format!(
                "base {} / total {}",
                report.risk_score.base_risk, report.risk_score.total
            ),
        ),
    ]);

    if !report.findings.is_empty() {
        out.push_str("Findings:\n");
        out.push_str(&findings_lines(&report.findings));
    }
    out
}
