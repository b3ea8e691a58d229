//! Ed25519 key handling.
//!
//! Private keys are PKCS#8 PEM, public keys SPKI PEM. The derived `key_id`
//! is `sha256:<hex>` over the SPKI DER bytes, so it is stable across PEM
//! re-encodings. Keys are loaded, used once and dropped; `SigningKey`
//! zeroizes on drop.

use std::path::Path;

use ed25519_dalek::{SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Load a private key from PKCS#8 PEM.
pub fn load_signing_key(path: &Path) -> Result<SigningKey> {
    use pkcs8::DecodePrivateKey;

    let pem = std::fs::read_to_string(path)
        .map_err(|e| Error::Key(format!("failed to read {}: {e}", path.display())))?;
    SigningKey::from_pkcs8_pem(&pem)
        .map_err(|e| Error::Key(format!("failed to parse private key PEM {}: {e}", path.display())))
}

/// Load a public key from SPKI PEM.
pub fn load_verifying_key(path: &Path) -> Result<VerifyingKey> {
    use pkcs8::DecodePublicKey;

    let pem = std::fs::read_to_string(path)
        .map_err(|e| Error::Key(format!("failed to read {}: {e}", path.display())))?;
    VerifyingKey::from_public_key_pem(&pem)
        .map_err(|e| Error::Key(format!("failed to parse public key PEM {}: {e}", path.display())))
}

/// Generate a fresh keypair.
pub fn generate_signing_key() -> SigningKey {
    SigningKey::generate(&mut rand::thread_rng())
}

/// `sha256:<lowercase-hex>` over the SPKI DER encoding of the public key.
pub fn key_id_for(key: &VerifyingKey) -> Result<String> {
    use pkcs8::EncodePublicKey;

    let der = key
        .to_public_key_der()
        .map_err(|e| Error::Key(format!("failed to encode public key as SPKI DER: {e}")))?;
    let hash = Sha256::digest(der.as_bytes());
    Ok(format!("sha256:{}", hex::encode(hash)))
}

/// Resolve `<dir>/<key_id>.pem`. The key_id is validated against path
/// traversal before it touches the filesystem.
pub fn keyring_lookup(dir: &Path, key_id: &str) -> Result<VerifyingKey> {
    validate_key_id(key_id)?;
    let path = dir.join(format!("{key_id}.pem"));
    if !path.is_file() {
        return Err(Error::Key(format!(
            "key '{key_id}' not present in keyring {}",
            dir.display()
        )));
    }
    load_verifying_key(&path)
}

fn validate_key_id(key_id: &str) -> Result<()> {
    if key_id.is_empty() {
        return Err(Error::Key("key_id must not be empty".into()));
    }
    if key_id.contains('/') || key_id.contains('\\') || key_id.contains("..") {
        return Err(Error::Key(format!(
            "key_id '{key_id}' contains path separators or traversal"
        )));
    }
    if key_id.chars().any(|c| c.is_control()) {
        return Err(Error::Key("key_id contains control characters".into()));
    }
    Ok(())
}
