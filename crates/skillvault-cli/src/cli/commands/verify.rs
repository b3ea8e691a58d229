//! `skillvault verify` - re-derive a bundle against a receipt.

use skillvault_core::keys::{keyring_lookup, load_verifying_key};
use skillvault_core::verify::{load_receipt, verify_receipt, VerifyOptions, VerifyReport};
use skillvault_core::{read_bundle, Error};

use super::{load_policy_args, run_or_report};
use crate::cli::args::VerifyArgs;
use crate::exit_codes::{EXIT_FAIL, EXIT_SUCCESS};
use crate::output::{emit, findings_lines, kv_table};

pub fn run(args: VerifyArgs) -> anyhow::Result<i32> {
    run_or_report(execute(args))
}

fn execute(args: VerifyArgs) -> skillvault_core::Result<i32> {
    let receipt = load_receipt(&args.receipt)?;
    let bundle = read_bundle(&args.bundle)?;
    let policy = load_policy_args(&args.policy)?;

    let pubkey = match (&args.pubkey, &args.keyring) {
        (Some(path), _) => Some(load_verifying_key(path)?),
        (None, Some(dir)) => {
            let key_id = receipt
                .signature
                .as_ref()
                .and_then(|sig| sig.key_id.as_deref())
                .ok_or_else(|| {
                    Error::Key("receipt carries no key_id; --keyring needs one (use --pubkey)".into())
                })?;
            Some(keyring_lookup(dir, key_id)?)
        }
        (None, None) => None,
    };

    let options = VerifyOptions {
        pubkey,
        offline: args.offline,
    };
    let report = verify_receipt(&receipt, &bundle, &policy, &options)?;

    emit(&args.output, &report, || render(&args, &report))?;
    Ok(if report.ok { EXIT_SUCCESS } else { EXIT_FAIL })
}

fn render(args: &VerifyArgs, report: &VerifyReport) -> String {
    let signature = match &report.signature {
        None => "(not checked)".to_string(),
        Some(check) if check.valid => format!(
            "valid ({})",
            check.key_id.as_deref().unwrap_or("no key id")
        ),
        Some(check) => format!(
            "INVALID: {}",
            check.reason.as_deref().unwrap_or("unknown reason")
        ),
    };

    let mut out = kv_table(&[
        ("Bundle", args.bundle.display().to_string()),
        ("Receipt", args.receipt.display().to_string()),
        ("Result", if report.ok { "OK".into() } else { "FAILED".into() }),
        ("SHA-256", report.bundle_sha256.clone()),
        ("Signature", signature),
    ]);

    if !report.findings.is_empty() {
        out.push_str("Findings:\n");
        out.push_str(&findings_lines(&report.findings));
    }
    out
}
