//! The crypto engine: symmetric encryption plus RSA key wrapping.
//!
//! Ciphertext layout is `IV || CTR(padded plaintext)`. The IV length is fixed
//! per [`CipherVariant`], and a fresh IV is drawn for every call.

use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use std::sync::Arc;

use crate::cipher::CipherVariant;
use crate::encoding::decode;
use crate::keys::{KeyPair, KeyPairAlgorithm, SymmetricKey};
use crate::material::CryptoMaterial;
use crate::random::SecureRandom;
use keevault_common::{Error, Result};

/// Symmetric and asymmetric primitives for one cipher variant.
#[derive(Debug, Clone)]
pub struct CryptoEngine {
    variant: CipherVariant,
    random: Arc<SecureRandom>,
}

impl CryptoEngine {
    /// Create an engine for `variant` drawing randomness from `random`.
    pub fn new(variant: CipherVariant, random: Arc<SecureRandom>) -> Self {
        Self { variant, random }
    }

    /// Create an engine with its own OS-seeded random source.
    pub fn with_entropy(variant: CipherVariant) -> Self {
        Self::new(variant, Arc::new(SecureRandom::from_entropy()))
    }

    /// The same random source, a different cipher.
    pub fn with_variant(&self, variant: CipherVariant) -> Self {
        Self::new(variant, self.random.clone())
    }

    /// The cipher variant.
    pub fn variant(&self) -> CipherVariant {
        self.variant
    }

    /// Algorithm name of the secret key (e.g. `AES`, `DESede`).
    pub fn secret_key_algorithm(&self) -> &'static str {
        self.variant.algorithm()
    }

    /// Generate `size` random bytes.
    pub fn random_bytes(&self, size: usize) -> Vec<u8> {
        self.random.bytes(size)
    }

    /// Build a key directly from a secret.
    ///
    /// The secret is used as-is: base64 of exactly one key is decoded,
    /// anything else contributes its UTF-8 bytes, truncated or zero-filled
    /// to the key length. There is no salt and no key stretching, so a
    /// low-entropy secret yields a low-entropy key.
    pub fn generate_key(&self, secret: &str) -> SymmetricKey {
        let key_length = self.variant.key_length();
        let mut bytes = match decode(secret) {
            Ok(decoded) if decoded.len() == key_length => decoded,
            _ => secret.as_bytes().to_vec(),
        };
        bytes.resize(key_length, 0);
        SymmetricKey::from_bytes(bytes)
    }

    /// Generate a random key at the variant's default strength.
    pub fn random_key(&self) -> SymmetricKey {
        let mut key = self.random.bytes(self.variant.key_length());
        if self.variant == CipherVariant::TripleDes {
            set_odd_parity(&mut key);
        }
        SymmetricKey::from_bytes(key)
    }

    /// Draw a fresh IV.
    pub fn create_iv(&self) -> Vec<u8> {
        self.random.bytes(self.variant.iv_length())
    }

    /// Encrypt `payload` under `key`.
    ///
    /// # Postconditions
    /// - Returns `IV || ciphertext` with a freshly drawn IV
    /// - The ciphertext length is the padded payload length
    ///
    /// # Errors
    /// - Returns error if the key length is wrong for the variant
    pub fn encrypt(&self, key: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
        let iv = self.create_iv();
        let mut body = self.variant.pad(payload);
        self.variant.apply_keystream(key, &iv, &mut body)?;

        let mut result = Vec::with_capacity(iv.len() + body.len());
        result.extend_from_slice(&iv);
        result.extend_from_slice(&body);
        Ok(result)
    }

    /// Decrypt `IV || ciphertext` under `key`.
    ///
    /// # Errors
    /// - Returns error if the key length is wrong for the variant
    /// - Returns error if the input is too short to hold an IV and one block
    /// - Returns error if padding is invalid (wrong key or altered ciphertext)
    pub fn decrypt(&self, key: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
        let iv_length = self.variant.iv_length();
        if payload.len() < iv_length + self.variant.block_size() {
            return Err(Error::Crypto("Invalid data for IV extraction".to_string()));
        }

        let (iv, body) = payload.split_at(iv_length);
        let mut body = body.to_vec();
        self.variant.apply_keystream(key, iv, &mut body)?;
        self.variant.unpad(body)
    }

    /// Derive the symmetric key from `secret` and generate a fresh keypair.
    ///
    /// # Errors
    /// - Returns error if the keypair algorithm is unsupported
    /// - Returns error if keypair generation fails
    pub fn create_crypto(
        &self,
        secret: &str,
        keypair_algorithm: &str,
        keypair_bits: usize,
    ) -> Result<CryptoMaterial> {
        let algorithm: KeyPairAlgorithm = keypair_algorithm.parse()?;
        let secret_key = self.generate_key(secret);
        let keypair = KeyPair::generate(algorithm, keypair_bits, &self.random)?;
        Ok(CryptoMaterial::new(secret_key, keypair))
    }

    /// Encrypt a small payload with an RSA public key.
    ///
    /// Only meant for wrapping a symmetric key, never for bulk data.
    pub fn encrypt_asymmetric(&self, public_key: &RsaPublicKey, payload: &[u8]) -> Result<Vec<u8>> {
        self.random
            .with_rng(|rng| public_key.encrypt(rng, Pkcs1v15Encrypt, payload))
            .map_err(|e| Error::Crypto(format!("RSA encryption failed: {}", e)))
    }

    /// Decrypt a payload produced by [`Self::encrypt_asymmetric`].
    pub fn decrypt_asymmetric(&self, private_key: &RsaPrivateKey, payload: &[u8]) -> Result<Vec<u8>> {
        private_key
            .decrypt(Pkcs1v15Encrypt, payload)
            .map_err(|e| Error::Crypto(format!("RSA decryption failed: {}", e)))
    }
}

/// Set the low bit of every byte so each has an odd number of ones, as DES
/// key bytes require.
fn set_odd_parity(key: &mut [u8]) {
    for byte in key.iter_mut() {
        let high = *byte & 0xFE;
        *byte = if high.count_ones() % 2 == 0 { high | 1 } else { high };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::encode;
    use keevault_common::ErrorKind;
    use proptest::prelude::*;

    fn engine(variant: CipherVariant) -> CryptoEngine {
        CryptoEngine::new(variant, Arc::new(SecureRandom::seeded(42)))
    }

    #[test]
    fn test_aes_hello() {
        let engine = engine(CipherVariant::Aes);
        let key = engine.random_key();
        assert_eq!(key.len(), 16);

        let encrypted = engine.encrypt(key.as_bytes(), b"hello").unwrap();
        assert_eq!(encrypted.len(), 16 + 16);
        assert_eq!(engine.decrypt(key.as_bytes(), &encrypted).unwrap(), b"hello");
    }

    #[test]
    fn test_triple_des_hello() {
        let engine = engine(CipherVariant::TripleDes);
        let key = engine.random_key();
        assert_eq!(key.len(), 24);

        let encrypted = engine.encrypt(key.as_bytes(), b"hello").unwrap();
        assert_eq!(encrypted.len(), 8 + 8);
        assert_eq!(engine.decrypt(key.as_bytes(), &encrypted).unwrap(), b"hello");
    }

    #[test]
    fn test_fresh_iv_each_time() {
        let engine = engine(CipherVariant::Aes);
        let key = engine.random_key();

        let ct1 = engine.encrypt(key.as_bytes(), b"same").unwrap();
        let ct2 = engine.encrypt(key.as_bytes(), b"same").unwrap();

        assert_ne!(&ct1[..16], &ct2[..16]);
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn test_wrong_key() {
        for variant in [CipherVariant::Aes, CipherVariant::TripleDes] {
            let engine = engine(variant);
            let key = engine.random_key();
            let other = engine.random_key();
            let plaintext = b"Secret data that spans more than one block";

            let encrypted = engine.encrypt(key.as_bytes(), plaintext).unwrap();
            match engine.decrypt(other.as_bytes(), &encrypted) {
                Err(e) => assert_eq!(e.kind(), ErrorKind::CryptoFailure),
                // Garbage that happens to end in valid padding.
                Ok(decrypted) => assert_ne!(decrypted, plaintext),
            }
        }
    }

    #[test]
    fn test_invalid_key_length() {
        let engine = engine(CipherVariant::Aes);
        let err = engine.encrypt(&[0u8; 5], b"data").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CryptoFailure);
    }

    #[test]
    fn test_short_input() {
        let engine = engine(CipherVariant::Aes);
        let key = engine.random_key();
        let err = engine.decrypt(key.as_bytes(), &[0u8; 20]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CryptoFailure);
    }

    #[test]
    fn test_empty_payload() {
        let engine = engine(CipherVariant::TripleDes);
        let key = engine.random_key();
        let encrypted = engine.encrypt(key.as_bytes(), b"").unwrap();
        assert_eq!(engine.decrypt(key.as_bytes(), &encrypted).unwrap(), b"");
    }

    #[test]
    fn test_generate_key_from_encoded_secret() {
        let engine = engine(CipherVariant::Aes);
        let random = engine.random_key();
        let derived = engine.generate_key(&encode(random.as_bytes()));
        assert_eq!(derived, random);
    }

    #[test]
    fn test_generate_key_from_password() {
        let engine = engine(CipherVariant::Aes);
        let key = engine.generate_key("s3cr3t-pw");
        assert_eq!(key.len(), 16);
        assert_eq!(&key.as_bytes()[..9], b"s3cr3t-pw");
        assert!(key.as_bytes()[9..].iter().all(|&b| b == 0));

        // Same secret, same key
        assert_eq!(engine.generate_key("s3cr3t-pw"), key);

        let long = engine.generate_key("a secret well beyond sixteen bytes");
        assert_eq!(long.as_bytes(), b"a secret well be");
    }

    #[test]
    fn test_triple_des_key_parity() {
        let engine = engine(CipherVariant::TripleDes);
        let key = engine.random_key();
        assert!(key.as_bytes().iter().all(|b| b.count_ones() % 2 == 1));
    }

    #[test]
    fn test_create_crypto() {
        let engine = engine(CipherVariant::Aes);
        let material = engine.create_crypto("s3cr3t-pw", "RSA", 1024).unwrap();
        assert_eq!(material.secret_key(), &engine.generate_key("s3cr3t-pw"));
        assert_eq!(material.keypair().size(), 128);

        let err = engine.create_crypto("s3cr3t-pw", "EC", 256).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CryptoFailure);
    }

    #[test]
    fn test_wrap_unwrap_key() {
        let engine = engine(CipherVariant::TripleDes);
        let material = engine.create_crypto("ignored", "RSA", 1024).unwrap();
        let key = engine.random_key();

        let wrapped = engine
            .encrypt_asymmetric(material.keypair().public_key(), key.as_bytes())
            .unwrap();
        assert_ne!(wrapped.as_slice(), key.as_bytes());

        let unwrapped = engine
            .decrypt_asymmetric(material.keypair().private_key(), &wrapped)
            .unwrap();
        assert_eq!(unwrapped, key.as_bytes());

        let err = engine
            .decrypt_asymmetric(material.keypair().private_key(), b"garbage")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CryptoFailure);
    }

    proptest! {
        #[test]
        fn prop_roundtrip(
            plaintext in proptest::collection::vec(any::<u8>(), 0..512),
            des in any::<bool>(),
        ) {
            let variant = if des { CipherVariant::TripleDes } else { CipherVariant::Aes };
            let engine = CryptoEngine::with_entropy(variant);
            let key = engine.random_key();
            let encrypted = engine.encrypt(key.as_bytes(), &plaintext).unwrap();
            prop_assert_eq!(engine.decrypt(key.as_bytes(), &encrypted).unwrap(), plaintext);
        }
    }
}
