//! Common error types for KeeVault.

use thiserror::Error;

/// Top-level error type for KeeVault operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A record or store was malformed (missing reserved keys, non-string values).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Cipher, key generation, signing or verification failed.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// The vault signature did not verify; the data must not be trusted.
    #[error("Tampered store: {0}")]
    Tampered(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A file that was expected to exist is missing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Coarse error classification for callers that branch on the kind of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Malformed record or document.
    ValidationError,
    /// Cipher/keygen/sign/verify failure, wrong key length, unsupported algorithm.
    CryptoFailure,
    /// Signature verification failed on load.
    ///
    /// Kept apart from `CryptoFailure` because it signals an integrity
    /// violation rather than a misconfiguration.
    TamperedStoreError,
    /// Missing file, permission error, partial write.
    IoFailure,
}

impl Error {
    /// The coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) | Error::Serialization(_) => ErrorKind::ValidationError,
            Error::Crypto(_) => ErrorKind::CryptoFailure,
            Error::Tampered(_) => ErrorKind::TamperedStoreError,
            Error::Io(_) | Error::NotFound(_) => ErrorKind::IoFailure,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
