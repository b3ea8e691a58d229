//! `skillvault export` - normalized ZIP writer (strict_v0).

use skillvault_core::bundle::export::{export_strict, PROFILE_STRICT_V0};
use skillvault_core::read_bundle;

use super::run_or_report;
use crate::cli::args::ExportArgs;
use crate::exit_codes::{EXIT_ERROR, EXIT_FAIL, EXIT_SUCCESS};

pub fn run(args: ExportArgs) -> anyhow::Result<i32> {
    if args.profile != PROFILE_STRICT_V0 {
        eprintln!(
            "{}",
            serde_json::json!({
                "error": {
                    "code": "UNSUPPORTED_EXPORT_PROFILE",
                    "message": format!("unsupported export profile '{}'; expected {PROFILE_STRICT_V0}", args.profile),
                }
            })
        );
        return Ok(EXIT_ERROR);
    }
    run_or_report(execute(args))
}

fn execute(args: ExportArgs) -> skillvault_core::Result<i32> {
    let bundle = read_bundle(&args.bundle)?;
    let findings = export_strict(&bundle, &args.out)?;

    if findings.is_empty() {
        eprintln!("Wrote {} ({} files)", args.out.display(), bundle.files.len());
        return Ok(EXIT_SUCCESS);
    }

    // Rejected: report the findings, write nothing.
    println!(
        "{}",
        serde_json::json!({
            "profile": PROFILE_STRICT_V0,
            "exported": false,
            "findings": findings,
        })
    );
    Ok(EXIT_FAIL)
}
