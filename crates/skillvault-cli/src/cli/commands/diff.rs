//! `skillvault diff` - deltas between two receipts or bundles.

use skillvault_core::diff::{diff_sources, ChangeKind, DiffReport, DiffSource};

use super::{load_policy_args, run_or_report};
use crate::cli::args::DiffArgs;
use crate::exit_codes::EXIT_SUCCESS;
use crate::output::emit;

pub fn run(args: DiffArgs) -> anyhow::Result<i32> {
    run_or_report(execute(args))
}

fn execute(args: DiffArgs) -> skillvault_core::Result<i32> {
    let policy = if args.policy.policy.is_some() {
        Some(load_policy_args(&args.policy)?)
    } else {
        None
    };

    let a = DiffSource::from_path(&args.a, policy.as_ref())?;
    let b = DiffSource::from_path(&args.b, policy.as_ref())?;
    let report = diff_sources(&a, &b);

    emit(&args.output, &report, || render(&report))?;
    Ok(EXIT_SUCCESS)
}

fn render(report: &DiffReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("A: {} ({})\n", report.a.source, report.a.bundle_sha256));
    out.push_str(&format!("B: {} ({})\n", report.b.source, report.b.bundle_sha256));
    out.push_str(&format!(
        "Files: +{} -{} ~{} ={}\n",
        report.summary.added, report.summary.removed, report.summary.modified, report.summary.unchanged
    ));

    for diff in &report.file_diffs {
        match diff.change {
            ChangeKind::Added => out.push_str(&format!("  + {}\n", diff.path)),
            ChangeKind::Removed => out.push_str(&format!("  - {}\n", diff.path)),
            ChangeKind::Modified => out.push_str(&format!("  ~ {}\n", diff.path)),
            ChangeKind::Unchanged => {}
        }
    }

    if !report.capability_deltas.added.is_empty() || !report.capability_deltas.removed.is_empty() {
        out.push_str("Capabilities:\n");
        for capability in &report.capability_deltas.added {
            out.push_str(&format!("  + {capability}\n"));
        }
        for capability in &report.capability_deltas.removed {
            out.push_str(&format!("  - {capability}\n"));
        }
    }

    if !report.finding_deltas.added.is_empty() || !report.finding_deltas.removed.is_empty() {
        out.push_str("Findings:\n");
        for key in &report.finding_deltas.added {
            out.push_str(&format!("  + {key}\n"));
        }
        for key in &report.finding_deltas.removed {
            out.push_str(&format!("  - {key}\n"));
        }
    }

    if report.is_empty() {
        out.push_str("No differences found.\n");
    }
    out
}
