//! Canonical JSON (RFC 8785 / JCS).
//!
//! Every signed or compared artifact goes through this module. `serde_jcs`
//! guarantees lexicographically sorted keys (UTF-16 code-unit order), no
//! insignificant whitespace, literal UTF-8 for non-ASCII, normalized
//! numbers, and rejection of NaN/Infinity.

use serde::Serialize;

use crate::error::{Error, Result};

/// Canonical JSON bytes of any serializable value.
pub fn to_vec<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_jcs::to_vec(value).map_err(|e| Error::Canonical(e.to_string()))
}

/// Canonical JSON string.
pub fn to_string<T: Serialize>(value: &T) -> Result<String> {
    serde_jcs::to_string(value).map_err(|e| Error::Canonical(e.to_string()))
}
