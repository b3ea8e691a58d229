use std::collections::BTreeSet;

use skillvault_core::{Capability, EvalOptions, Policy};

use super::args::{Cli, Command, PolicyArgs};
use crate::exit_codes::EXIT_ERROR;

pub mod diff;
pub mod export;
pub mod gate;
pub mod keygen;
pub mod receipt;
pub mod scan;
pub mod verify;

pub fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Scan(args) => scan::run(args),
        Command::Receipt(args) => receipt::run(args),
        Command::Verify(args) => verify::run(args),
        Command::Gate(args) => gate::run(args),
        Command::Diff(args) => diff::run(args),
        Command::Export(args) => export::run(args),
        Command::Keygen(args) => Ok(keygen::run(args)),
    }
}

/// Map a hard pipeline error to the machine-readable stderr object and the
/// hard-error exit code.
pub fn run_or_report(result: skillvault_core::Result<i32>) -> anyhow::Result<i32> {
    match result {
        Ok(code) => Ok(code),
        Err(err) => {
            eprintln!(
                "{}",
                serde_json::json!({
                    "error": {"code": err.code(), "message": err.to_string()}
                })
            );
            Ok(EXIT_ERROR)
        }
    }
}

/// Resolve `--policy` / `--policy-profile` (defaults when omitted).
pub fn load_policy_args(args: &PolicyArgs) -> skillvault_core::Result<Policy> {
    match &args.policy {
        None => Ok(Policy::default()),
        Some(path) => Ok(skillvault_core::load_policy(
            path,
            args.policy_profile.as_deref(),
        )?),
    }
}

/// Build evaluation options from `--approve` flags.
pub fn eval_options(approvals: &[Capability]) -> EvalOptions {
    EvalOptions {
        approvals: approvals.iter().copied().collect::<BTreeSet<_>>(),
    }
}
