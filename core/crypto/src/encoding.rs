//! Base64 helpers for binary values transported as JSON strings.
//!
//! Every binary field KeeVault persists (keys, IV-prefixed ciphertext,
//! signatures) uses standard, padded base64.

use base64::{engine::general_purpose::STANDARD, Engine};

use keevault_common::{Error, Result};

/// Encode bytes as standard base64.
pub fn encode(data: impl AsRef<[u8]>) -> String {
    STANDARD.encode(data)
}

/// Decode standard base64.
///
/// # Errors
/// - Returns `Error::Crypto` if the input is not valid standard base64
pub fn decode(data: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(data.trim())
        .map_err(|e| Error::Crypto(format!("Invalid base64: {}", e)))
}
