//! Symmetric cipher variants.
//!
//! Each variant is a block cipher run in CTR mode over PKCS#5-padded input.
//! The variants differ only in algorithm name, transform string, key length
//! and IV length, so they are modelled as one enum rather than a hierarchy.

use aes::Aes128;
use ctr::cipher::{KeyIvInit, StreamCipher};
use des::TdesEde3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use keevault_common::{Error, Result};

type Aes128Ctr = ctr::Ctr128BE<Aes128>;
type TdesEde3Ctr = ctr::Ctr64BE<TdesEde3>;

/// Symmetric algorithm used for the vault payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CipherVariant {
    /// AES with a 128-bit key and 16-byte IV.
    #[default]
    #[serde(rename = "AES")]
    Aes,
    /// Triple DES (EDE) with a 168-bit key (24 bytes with parity) and 8-byte IV.
    #[serde(rename = "DESede")]
    TripleDes,
}

impl CipherVariant {
    /// Algorithm name of the secret key.
    pub fn algorithm(&self) -> &'static str {
        match self {
            CipherVariant::Aes => "AES",
            CipherVariant::TripleDes => "DESede",
        }
    }

    /// Full cipher transform description.
    pub fn transform(&self) -> &'static str {
        match self {
            CipherVariant::Aes => "AES/CTR/PKCS5Padding",
            CipherVariant::TripleDes => "DESede/CTR/PKCS5Padding",
        }
    }

    /// Length in bytes of the IV prepended to every ciphertext.
    pub fn iv_length(&self) -> usize {
        match self {
            CipherVariant::Aes => 16,
            CipherVariant::TripleDes => 8,
        }
    }

    /// Length in bytes of a raw key.
    pub fn key_length(&self) -> usize {
        match self {
            CipherVariant::Aes => 16,
            CipherVariant::TripleDes => 24,
        }
    }

    /// Effective key strength in bits.
    pub fn key_bits(&self) -> usize {
        match self {
            CipherVariant::Aes => 128,
            CipherVariant::TripleDes => 168,
        }
    }

    /// Block size, which is also the padding unit.
    pub fn block_size(&self) -> usize {
        self.iv_length()
    }

    /// XOR the CTR keystream for `key`/`iv` into `buf`.
    ///
    /// # Errors
    /// - Returns `Error::Crypto` if the key or IV has the wrong length
    pub(crate) fn apply_keystream(&self, key: &[u8], iv: &[u8], buf: &mut [u8]) -> Result<()> {
        if key.len() != self.key_length() {
            return Err(Error::Crypto(format!(
                "Invalid {} key length: expected {}, got {}",
                self.algorithm(),
                self.key_length(),
                key.len()
            )));
        }

        match self {
            CipherVariant::Aes => {
                let mut cipher = Aes128Ctr::new_from_slices(key, iv)
                    .map_err(|e| Error::Crypto(format!("{}: {}", self.transform(), e)))?;
                cipher.apply_keystream(buf);
            }
            CipherVariant::TripleDes => {
                let mut cipher = TdesEde3Ctr::new_from_slices(key, iv)
                    .map_err(|e| Error::Crypto(format!("{}: {}", self.transform(), e)))?;
                cipher.apply_keystream(buf);
            }
        }
        Ok(())
    }

    /// Append PKCS#5 padding up to a multiple of the block size.
    pub(crate) fn pad(&self, data: &[u8]) -> Vec<u8> {
        let block = self.block_size();
        let pad_len = block - data.len() % block;
        let mut padded = Vec::with_capacity(data.len() + pad_len);
        padded.extend_from_slice(data);
        padded.resize(data.len() + pad_len, pad_len as u8);
        padded
    }

    /// Strip PKCS#5 padding in place.
    ///
    /// # Errors
    /// - Returns `Error::Crypto` if the padding is malformed, which is what a
    ///   wrong key or altered ciphertext produces
    pub(crate) fn unpad(&self, mut data: Vec<u8>) -> Result<Vec<u8>> {
        let block = self.block_size();
        if data.is_empty() || data.len() % block != 0 {
            return Err(Error::Crypto(format!(
                "Ciphertext length {} is not a multiple of the {} block size",
                data.len(),
                self.algorithm()
            )));
        }

        let pad_len = data[data.len() - 1] as usize;
        if pad_len == 0 || pad_len > block {
            return Err(Error::Crypto("Bad padding".to_string()));
        }
        let body_len = data.len() - pad_len;
        if data[body_len..].iter().any(|&b| b as usize != pad_len) {
            return Err(Error::Crypto("Bad padding".to_string()));
        }

        data.truncate(body_len);
        Ok(data)
    }
}

impl fmt::Display for CipherVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.algorithm())
    }
}

impl FromStr for CipherVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "aes" => Ok(CipherVariant::Aes),
            "desede" | "3des" | "tripledes" => Ok(CipherVariant::TripleDes),
            _ => Err(Error::Crypto(format!("Unsupported cipher algorithm: {}", s))),
        }
    }
}
