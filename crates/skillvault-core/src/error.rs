//! Boundary error types.
//!
//! Errors abort an invocation and exit non-zero; anything that should feed a
//! verdict instead is a [`crate::finding::Finding`].

use std::path::PathBuf;

/// Errors produced by the trust pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("bundle not found: {}", .0.display())]
    BundleNotFound(PathBuf),

    #[error("unsupported bundle input: {} (expected a directory or .zip archive)", .0.display())]
    UnsupportedBundleInput(PathBuf),

    #[error("invalid zip archive {}: {reason}", path.display())]
    ZipRead { path: PathBuf, reason: String },

    #[error("failed to write zip archive {}: {reason}", path.display())]
    ZipWrite { path: PathBuf, reason: String },

    #[error("failed to parse receipt {}: {reason}", path.display())]
    ReceiptParse { path: PathBuf, reason: String },

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("signing key error: {0}")]
    Key(String),

    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),

    #[error("canonical json serialization failed: {0}")]
    Canonical(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Machine-readable code surfaced by the CLI on hard errors.
    pub fn code(&self) -> &'static str {
        match self {
            Error::BundleNotFound(_) => "BUNDLE_NOT_FOUND",
            Error::UnsupportedBundleInput(_) => "UNSUPPORTED_BUNDLE_INPUT",
            Error::ZipRead { .. } => "ZIP_READ_ERROR",
            Error::ZipWrite { .. } => "ZIP_WRITE_ERROR",
            Error::ReceiptParse { .. } => "RECEIPT_PARSE_ERROR",
            Error::Policy(PolicyError::Parse { .. }) => "POLICY_PARSE_ERROR",
            Error::Policy(_) => "POLICY_SCHEMA_INVALID",
            Error::Key(_) => "KEY_ERROR",
            Error::SignatureInvalid(_) => "SIGNATURE_INVALID",
            Error::Canonical(_) => "CANONICAL_JSON_ERROR",
            Error::Io(_) => "IO_ERROR",
        }
    }
}

/// Policy load failures. Schema errors always name the offending field path.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PolicyError {
    #[error("failed to parse policy {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("invalid policy schema at `{field}`: {reason} (got {value})")]
    Schema {
        field: String,
        reason: String,
        value: String,
    },

    #[error("unknown policy profile '{0}'")]
    UnknownProfile(String),
}

impl PolicyError {
    pub fn schema(field: impl Into<String>, reason: impl Into<String>, value: impl std::fmt::Display) -> Self {
        PolicyError::Schema {
            field: field.into(),
            reason: reason.into(),
            value: value.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
