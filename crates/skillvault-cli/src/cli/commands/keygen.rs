//! `skillvault keygen` - mint an ed25519 keypair for receipt signing.
//!
//! Writes `private_key.pem` (PKCS#8, mode 0600) and `public_key.pem` (SPKI)
//! into `--out-dir` and prints the derived key_id on stdout. The key_id is
//! the SPKI digest, which is also the filename `verify --keyring` resolves.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use skillvault_core::keys::{generate_signing_key, key_id_for};

use crate::cli::args::KeygenArgs;
use crate::exit_codes::{EXIT_ERROR, EXIT_SUCCESS};

pub fn run(args: KeygenArgs) -> i32 {
    match mint_keypair(&args) {
        Ok(key_id) => {
            println!("key_id: {key_id}");
            EXIT_SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_ERROR
        }
    }
}

fn mint_keypair(args: &KeygenArgs) -> Result<String> {
    let private_path = args.out_dir.join("private_key.pem");
    let public_path = args.out_dir.join("public_key.pem");

    if !args.force {
        for existing in [&private_path, &public_path] {
            if existing.exists() {
                anyhow::bail!(
                    "refusing to overwrite {} (pass --force to replace it)",
                    existing.display()
                );
            }
        }
    }

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;

    let signing_key = generate_signing_key();
    let verifying_key = signing_key.verifying_key();
    let key_id = key_id_for(&verifying_key)?;

    let private_pem = signing_key
        .to_pkcs8_pem(LineEnding::LF)
        .context("encoding private key")?;
    let public_pem = verifying_key
        .to_public_key_pem(LineEnding::LF)
        .context("encoding public key")?;

    write_pem(&private_path, private_pem.as_bytes(), true)?;
    write_pem(&public_path, public_pem.as_bytes(), false)?;

    eprintln!("New signing keypair:");
    eprintln!("  private: {}", private_path.display());
    eprintln!("  public:  {}", public_path.display());
    eprintln!("Sign with `receipt --signing-key {}`;", private_path.display());
    eprintln!("to trust it in a keyring, store the public key as <keyring>/<key_id>.pem.");

    Ok(key_id)
}

/// Write a PEM file; private material gets owner-only permissions where the
/// platform supports them.
fn write_pem(path: &Path, pem: &[u8], restrict: bool) -> Result<()> {
    fs::write(path, pem).with_context(|| format!("writing {}", path.display()))?;

    #[cfg(unix)]
    if restrict {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("restricting permissions on {}", path.display()))?;
    }
    #[cfg(not(unix))]
    let _ = restrict;

    Ok(())
}
