use std::path::PathBuf;

use clap::{Parser, Subcommand};
use skillvault_core::Capability;

#[derive(Parser)]
#[command(
    name = "skillvault",
    version,
    about = "Signed, reproducible trust receipts for skill bundles"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Scan a bundle and emit its ScanReport
    Scan(ScanArgs),
    /// Scan, gate and (optionally) sign a trust receipt
    Receipt(ReceiptArgs),
    /// Re-derive a bundle against a receipt and verify its signature
    Verify(VerifyArgs),
    /// Evaluate policy gates over a receipt or a bundle
    Gate(GateArgs),
    /// Diff two receipts or bundles
    Diff(DiffArgs),
    /// Write a normalized, bit-stable ZIP of a bundle
    Export(ExportArgs),
    /// Generate an ed25519 keypair for receipt signing
    Keygen(KeygenArgs),
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

#[derive(clap::Args, Debug, Clone)]
pub struct OutputArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Write output to this path instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct PolicyArgs {
    /// Policy v1 YAML file (defaults apply when omitted)
    #[arg(long)]
    pub policy: Option<PathBuf>,

    /// Named profile inside the policy file
    #[arg(long = "policy-profile", requires = "policy")]
    pub policy_profile: Option<String>,
}

fn parse_capability(raw: &str) -> Result<Capability, String> {
    raw.parse()
}

#[derive(clap::Args, Debug, Clone)]
pub struct ScanArgs {
    /// Bundle directory or .zip archive
    pub bundle: PathBuf,

    /// Freeze timestamps and other run-varying metadata
    #[arg(long)]
    pub deterministic: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ReceiptArgs {
    /// Bundle directory or .zip archive
    pub bundle: PathBuf,

    #[command(flatten)]
    pub policy: PolicyArgs,

    /// Ed25519 private key (PKCS#8 PEM) used to sign the receipt
    #[arg(long = "signing-key")]
    pub signing_key: Option<PathBuf>,

    /// Opaque key identifier recorded in the signature
    /// (default: sha256 of the public key's SPKI DER)
    #[arg(long = "key-id", requires = "signing_key")]
    pub key_id: Option<String>,

    /// Approve a capability gated with require_approval (repeatable)
    #[arg(long = "approve", value_name = "CAPABILITY", value_parser = parse_capability)]
    pub approve: Vec<Capability>,

    /// Freeze created_at to the deterministic constant
    #[arg(long)]
    pub deterministic: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(clap::Args, Debug, Clone)]
pub struct VerifyArgs {
    /// Bundle directory or .zip archive
    pub bundle: PathBuf,

    /// Receipt to verify against
    #[arg(long)]
    pub receipt: PathBuf,

    #[command(flatten)]
    pub policy: PolicyArgs,

    /// Public key (SPKI PEM) for signature verification
    #[arg(long)]
    pub pubkey: Option<PathBuf>,

    /// Directory of trusted public keys named <key_id>.pem
    #[arg(long, conflicts_with = "pubkey")]
    pub keyring: Option<PathBuf>,

    /// Assert the no-network posture (signature checks are local anyway)
    #[arg(long)]
    pub offline: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(clap::Args, Debug, Clone)]
pub struct GateArgs {
    /// Bundle directory or .zip archive (scanned fresh)
    #[arg(required_unless_present = "receipt", conflicts_with = "receipt")]
    pub bundle: Option<PathBuf>,

    /// Gate an existing receipt without rehashing the bundle
    #[arg(long)]
    pub receipt: Option<PathBuf>,

    #[command(flatten)]
    pub policy: PolicyArgs,

    /// Approve a capability gated with require_approval (repeatable)
    #[arg(long = "approve", value_name = "CAPABILITY", value_parser = parse_capability)]
    pub approve: Vec<Capability>,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(clap::Args, Debug, Clone)]
pub struct DiffArgs {
    /// Baseline: receipt file or bundle path
    pub a: PathBuf,

    /// Candidate: receipt file or bundle path
    pub b: PathBuf,

    #[command(flatten)]
    pub policy: PolicyArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ExportArgs {
    /// Bundle directory or .zip archive
    pub bundle: PathBuf,

    /// Output archive path
    #[arg(long)]
    pub out: PathBuf,

    /// Export profile
    #[arg(long, default_value = skillvault_core::bundle::export::PROFILE_STRICT_V0)]
    pub profile: String,
}

#[derive(clap::Args, Debug, Clone)]
pub struct KeygenArgs {
    /// Output directory for keypair files
    #[arg(long = "out-dir", default_value = ".")]
    pub out_dir: PathBuf,

    /// Force overwrite existing files
    #[arg(long, short)]
    pub force: bool,
}
