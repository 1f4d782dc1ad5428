//! Key types with secure memory handling.
//!
//! The symmetric key zeroizes its memory on drop. RSA private keys zeroize
//! themselves; `KeyPair` only takes care never to print them.

use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha384, Sha512};
use std::fmt;
use std::str::FromStr;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::encoding::{decode, encode};
use crate::random::SecureRandom;
use keevault_common::{Error, Result};

/// Raw symmetric key bytes.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    key: Vec<u8>,
}

impl SymmetricKey {
    /// Create a key from raw bytes.
    pub fn from_bytes(key: Vec<u8>) -> Self {
        Self { key }
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    /// Key length in bytes.
    pub fn len(&self) -> usize {
        self.key.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymmetricKey([REDACTED; {} bytes])", self.key.len())
    }
}

/// Asymmetric keypair algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPairAlgorithm {
    Rsa,
}

impl FromStr for KeyPairAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("RSA") {
            Ok(KeyPairAlgorithm::Rsa)
        } else {
            Err(Error::Crypto(format!("Unsupported keypair algorithm: {}", s)))
        }
    }
}

/// Signature scheme: RSA PKCS#1 v1.5 over a SHA-2 digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    #[default]
    #[serde(rename = "SHA256withRSA")]
    Sha256WithRsa,
    #[serde(rename = "SHA384withRSA")]
    Sha384WithRsa,
    #[serde(rename = "SHA512withRSA")]
    Sha512WithRsa,
}

impl SignatureAlgorithm {
    /// Standard algorithm name.
    pub fn name(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Sha256WithRsa => "SHA256withRSA",
            SignatureAlgorithm::Sha384WithRsa => "SHA384withRSA",
            SignatureAlgorithm::Sha512WithRsa => "SHA512withRSA",
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SHA256WITHRSA" => Ok(SignatureAlgorithm::Sha256WithRsa),
            "SHA384WITHRSA" => Ok(SignatureAlgorithm::Sha384WithRsa),
            "SHA512WITHRSA" => Ok(SignatureAlgorithm::Sha512WithRsa),
            _ => Err(Error::Crypto(format!("Unsupported signature algorithm: {}", s))),
        }
    }
}

/// RSA public/private keypair used for signing and key wrapping.
#[derive(Clone)]
pub struct KeyPair {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
}

impl KeyPair {
    /// Generate a fresh keypair.
    ///
    /// # Errors
    /// - Returns error if the key size is rejected by the RSA implementation
    pub fn generate(algorithm: KeyPairAlgorithm, bits: usize, random: &SecureRandom) -> Result<Self> {
        match algorithm {
            KeyPairAlgorithm::Rsa => {
                let private_key = random
                    .with_rng(|rng| RsaPrivateKey::new(rng, bits))
                    .map_err(|e| Error::Crypto(format!("RSA key generation failed: {}", e)))?;
                let public_key = RsaPublicKey::from(&private_key);
                Ok(Self {
                    private_key,
                    public_key,
                })
            }
        }
    }

    /// Rebuild a keypair from its encoded forms.
    ///
    /// # Preconditions
    /// - `private_der` is a PKCS#8 DER private key
    /// - `public_der` is an X.509 SubjectPublicKeyInfo DER public key
    ///
    /// # Errors
    /// - Returns error if either key fails to parse or they do not belong together
    pub fn from_encoded(private_der: &[u8], public_der: &[u8]) -> Result<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_der(private_der)
            .map_err(|e| Error::Crypto(format!("Invalid private key: {}", e)))?;
        let public_key = RsaPublicKey::from_public_key_der(public_der)
            .map_err(|e| Error::Crypto(format!("Invalid public key: {}", e)))?;

        if RsaPublicKey::from(&private_key) != public_key {
            return Err(Error::Crypto(
                "Public key does not match private key".to_string(),
            ));
        }

        Ok(Self {
            private_key,
            public_key,
        })
    }

    /// The RSA private key.
    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    /// The RSA public key.
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// Modulus size in bytes; also the length of every signature.
    pub fn size(&self) -> usize {
        self.public_key.size()
    }

    /// PKCS#8 DER encoding of the private key.
    pub fn encoded_private(&self) -> Result<Vec<u8>> {
        let doc = self
            .private_key
            .to_pkcs8_der()
            .map_err(|e| Error::Crypto(format!("Cannot encode private key: {}", e)))?;
        Ok(doc.as_bytes().to_vec())
    }

    /// X.509 SubjectPublicKeyInfo DER encoding of the public key.
    pub fn encoded_public(&self) -> Result<Vec<u8>> {
        let doc = self
            .public_key
            .to_public_key_der()
            .map_err(|e| Error::Crypto(format!("Cannot encode public key: {}", e)))?;
        Ok(doc.as_bytes().to_vec())
    }

    /// Sign the UTF-8 bytes of `payload` and return the base64 signature.
    pub fn sign(&self, payload: &str, algorithm: SignatureAlgorithm) -> Result<String> {
        let msg = payload.as_bytes();
        let key = self.private_key.clone();
        let signature = match algorithm {
            SignatureAlgorithm::Sha256WithRsa => SigningKey::<Sha256>::new(key).try_sign(msg),
            SignatureAlgorithm::Sha384WithRsa => SigningKey::<Sha384>::new(key).try_sign(msg),
            SignatureAlgorithm::Sha512WithRsa => SigningKey::<Sha512>::new(key).try_sign(msg),
        }
        .map_err(|e| Error::Crypto(format!("Signing failed: {}", e)))?;

        Ok(encode(signature.to_vec()))
    }

    /// Verify a base64 signature over the UTF-8 bytes of `payload`.
    ///
    /// # Returns
    /// - `Ok(true)` if the signature matches
    /// - `Ok(false)` if a well-formed signature does not match
    ///
    /// # Errors
    /// - Returns `Error::Crypto` if the signature is not base64 or is not
    ///   exactly one modulus long
    pub fn verify(&self, payload: &str, signature: &str, algorithm: SignatureAlgorithm) -> Result<bool> {
        let bytes = decode(signature)?;
        if bytes.len() != self.size() {
            return Err(Error::Crypto(format!(
                "Malformed signature: expected {} bytes, got {}",
                self.size(),
                bytes.len()
            )));
        }
        let signature = Signature::try_from(bytes.as_slice())
            .map_err(|e| Error::Crypto(format!("Malformed signature: {}", e)))?;

        let msg = payload.as_bytes();
        let key = self.public_key.clone();
        let verified = match algorithm {
            SignatureAlgorithm::Sha256WithRsa => VerifyingKey::<Sha256>::new(key).verify(msg, &signature),
            SignatureAlgorithm::Sha384WithRsa => VerifyingKey::<Sha384>::new(key).verify(msg, &signature),
            SignatureAlgorithm::Sha512WithRsa => VerifyingKey::<Sha512>::new(key).verify(msg, &signature),
        };
        Ok(verified.is_ok())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyPair(RSA-{}, [REDACTED])", self.size() * 8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keevault_common::ErrorKind;

    fn keypair() -> KeyPair {
        KeyPair::generate(KeyPairAlgorithm::Rsa, 1024, &SecureRandom::seeded(11)).unwrap()
    }

    #[test]
    fn test_sign_verify() {
        let pair = keypair();
        let message = "hello world, my name is peter parker!";

        for algorithm in [
            SignatureAlgorithm::Sha256WithRsa,
            SignatureAlgorithm::Sha384WithRsa,
            SignatureAlgorithm::Sha512WithRsa,
        ] {
            let signature = pair.sign(message, algorithm).unwrap();
            assert!(pair.verify(message, &signature, algorithm).unwrap());
        }
    }

    #[test]
    fn test_verify_other_payload_is_false() {
        let pair = keypair();
        let signature = pair.sign("other", SignatureAlgorithm::default()).unwrap();
        assert!(!pair
            .verify("payload", &signature, SignatureAlgorithm::default())
            .unwrap());
    }

    #[test]
    fn test_verify_wrong_algorithm_is_false() {
        let pair = keypair();
        let signature = pair
            .sign("payload", SignatureAlgorithm::Sha256WithRsa)
            .unwrap();
        assert!(!pair
            .verify("payload", &signature, SignatureAlgorithm::Sha512WithRsa)
            .unwrap());
    }

    #[test]
    fn test_verify_malformed_fails_closed() {
        let pair = keypair();
        let algorithm = SignatureAlgorithm::default();

        let err = pair.verify("payload", "%%% not base64", algorithm).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CryptoFailure);

        let short = encode([1u8; 10]);
        let err = pair.verify("payload", &short, algorithm).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CryptoFailure);

        let err = pair.verify("payload", "", algorithm).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CryptoFailure);
    }

    #[test]
    fn test_encoded_roundtrip() {
        let pair = keypair();
        let private_der = pair.encoded_private().unwrap();
        let public_der = pair.encoded_public().unwrap();

        let restored = KeyPair::from_encoded(&private_der, &public_der).unwrap();
        let signature = pair.sign("payload", SignatureAlgorithm::default()).unwrap();
        assert!(restored
            .verify("payload", &signature, SignatureAlgorithm::default())
            .unwrap());
    }

    #[test]
    fn test_from_encoded_rejects_mismatch() {
        let a = keypair();
        let b = KeyPair::generate(KeyPairAlgorithm::Rsa, 1024, &SecureRandom::seeded(12)).unwrap();

        let result = KeyPair::from_encoded(
            &a.encoded_private().unwrap(),
            &b.encoded_public().unwrap(),
        );
        assert!(result.is_err());
        assert!(KeyPair::from_encoded(b"junk", b"junk").is_err());
    }

    #[test]
    fn test_algorithm_parsing() {
        assert_eq!(
            "RSA".parse::<KeyPairAlgorithm>().unwrap(),
            KeyPairAlgorithm::Rsa
        );
        assert!("DSA".parse::<KeyPairAlgorithm>().is_err());
        assert_eq!(
            "SHA256withRSA".parse::<SignatureAlgorithm>().unwrap(),
            SignatureAlgorithm::Sha256WithRsa
        );
        assert!("MD5withRSA".parse::<SignatureAlgorithm>().is_err());
    }

    #[test]
    fn test_debug_redacted() {
        let key = SymmetricKey::from_bytes(vec![7u8; 16]);
        assert_eq!(format!("{:?}", key), "SymmetricKey([REDACTED; 16 bytes])");
        assert!(format!("{:?}", keypair()).contains("REDACTED"));
    }
}
