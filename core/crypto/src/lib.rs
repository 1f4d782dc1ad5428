//! Cryptographic primitives for KeeVault.
//!
//! This module provides:
//! - Symmetric encryption through a pluggable [`CipherVariant`] (AES, 3DES),
//!   always in CTR mode with PKCS#5 padding and a fresh IV per call
//! - RSA keypairs for signing and for wrapping the symmetric key
//! - Canonical base64 helpers for binary values carried in JSON
//! - An explicit, shareable secure random source
//!
//! # Security Guarantees
//! - Symmetric key material is zeroized on drop
//! - No plaintext or key material is ever logged
//! - Library error types never escape; every failure is `Error::Crypto`

pub mod cipher;
pub mod encoding;
pub mod engine;
pub mod keys;
pub mod material;
pub mod random;

pub use cipher::CipherVariant;
pub use encoding::{decode, encode};
pub use engine::CryptoEngine;
pub use keys::{KeyPair, KeyPairAlgorithm, SignatureAlgorithm, SymmetricKey};
pub use material::CryptoMaterial;
pub use random::SecureRandom;
