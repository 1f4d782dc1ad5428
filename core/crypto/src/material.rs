//! Crypto material: a symmetric key bundled with an RSA keypair.

use crate::keys::{KeyPair, SignatureAlgorithm, SymmetricKey};
use keevault_common::Result;

/// Immutable bundle of a raw symmetric key and an asymmetric keypair.
///
/// Created once at registration time by [`crate::CryptoEngine::create_crypto`].
/// All values are unencrypted; persisting it is the caller's job and must
/// wrap the symmetric key first.
#[derive(Debug, Clone)]
pub struct CryptoMaterial {
    secret_key: SymmetricKey,
    keypair: KeyPair,
}

impl CryptoMaterial {
    pub fn new(secret_key: SymmetricKey, keypair: KeyPair) -> Self {
        Self {
            secret_key,
            keypair,
        }
    }

    /// The raw symmetric key.
    pub fn secret_key(&self) -> &SymmetricKey {
        &self.secret_key
    }

    /// The asymmetric keypair.
    pub fn keypair(&self) -> &KeyPair {
        &self.keypair
    }

    /// Split into the symmetric key and the keypair.
    pub fn into_parts(self) -> (SymmetricKey, KeyPair) {
        (self.secret_key, self.keypair)
    }

    /// Sign `payload` with the private key.
    pub fn sign(&self, payload: &str, algorithm: SignatureAlgorithm) -> Result<String> {
        self.keypair.sign(payload, algorithm)
    }

    /// Verify a signature with the public key.
    pub fn verify(&self, payload: &str, signature: &str, algorithm: SignatureAlgorithm) -> Result<bool> {
        self.keypair.verify(payload, signature, algorithm)
    }
}
