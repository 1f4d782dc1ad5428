//! Vault crypto: registration handling and the envelope protocol.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::envelope::VaultEnvelope;
use crate::json::json_error;
use crate::record::Record;
use crate::registration::{locate, Registration};
use keevault_common::{Error, RegistrationId, Result, SensitiveBytes};
use keevault_crypto::{decode, encode, CryptoEngine, CryptoMaterial, KeyPair, SignatureAlgorithm};
use keevault_storage::LocalStore;

/// Size in bytes of the registration salt.
const SALT_LENGTH: usize = 8;

/// Lifecycle of a [`VaultCrypto`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultState {
    /// No registration created or loaded yet.
    Uninitialized,
    /// A registration was just created.
    Registered,
    /// A registration was loaded, or the vault was read successfully.
    Loaded,
}

/// Keys available once a registration exists.
struct VaultKeys {
    registration: Registration,
    keypair: KeyPair,
    wrapped_key: Vec<u8>,
}

/// Orchestrates the registration and the encrypted vault file next to it.
///
/// The symmetric key stays wrapped at rest and in memory; it is unwrapped
/// for the duration of a single [`encrypt`](Self::encrypt) or
/// [`load_vault`](Self::load_vault) call.
pub struct VaultCrypto {
    engine: CryptoEngine,
    registration_path: PathBuf,
    signature_algorithm: SignatureAlgorithm,
    state: VaultState,
    keys: Option<VaultKeys>,
}

impl VaultCrypto {
    /// An uninitialized instance for the registration at `registration_path`.
    pub fn new(
        engine: CryptoEngine,
        registration_path: impl Into<PathBuf>,
        signature_algorithm: SignatureAlgorithm,
    ) -> Self {
        Self {
            engine,
            registration_path: registration_path.into(),
            signature_algorithm,
            state: VaultState::Uninitialized,
            keys: None,
        }
    }

    /// Create and persist a new registration from `material`.
    ///
    /// # Postconditions
    /// - The registration file exists with the wrapped key and the keypair
    /// - State is `Registered`
    pub fn create(
        engine: CryptoEngine,
        material: CryptoMaterial,
        registration_path: impl Into<PathBuf>,
        signature_algorithm: SignatureAlgorithm,
    ) -> Result<Self> {
        let mut vault = Self::new(engine, registration_path, signature_algorithm);
        vault.register(material)?;
        Ok(vault)
    }

    /// Load an existing registration.
    ///
    /// # Postconditions
    /// - State is `Loaded`
    pub fn open(
        engine: CryptoEngine,
        registration_path: impl Into<PathBuf>,
        signature_algorithm: SignatureAlgorithm,
    ) -> Result<Self> {
        let mut vault = Self::new(engine, registration_path, signature_algorithm);
        vault.load_registration()?;
        Ok(vault)
    }

    /// Wrap the secret key of `material` and write the registration.
    ///
    /// # Errors
    /// - Returns `Error::Validation` if a registration is already loaded or
    ///   a registration file already exists; an existing one is never replaced
    /// - Returns `Error::Crypto` if the key cannot be wrapped or encoded
    /// - Returns `Error::Io` if the file cannot be written
    pub fn register(&mut self, material: CryptoMaterial) -> Result<()> {
        if self.keys.is_some() {
            return Err(Error::Validation(
                "Registration already initialized".to_string(),
            ));
        }
        if self.registration_path.exists() {
            return Err(Error::Validation(format!(
                "Registration already exists: {}",
                self.registration_path.display()
            )));
        }

        let (secret_key, keypair) = material.into_parts();
        let wrapped_key = self
            .engine
            .encrypt_asymmetric(keypair.public_key(), secret_key.as_bytes())?;

        let registration = Registration {
            id: RegistrationId::generate(),
            secret_key: encode(&wrapped_key),
            public_key: encode(keypair.encoded_public()?),
            private_key: encode(keypair.encoded_private()?),
            salt: encode(self.engine.random_bytes(SALT_LENGTH)),
            algorithm: self.engine.variant(),
        };
        registration.save(&self.registration_path)?;

        info!(
            id = %registration.id,
            algorithm = %registration.algorithm,
            path = %self.registration_path.display(),
            "Registration created"
        );

        self.keys = Some(VaultKeys {
            registration,
            keypair,
            wrapped_key,
        });
        self.state = VaultState::Registered;
        Ok(())
    }

    /// Read the registration file and rebuild the keypair.
    ///
    /// The wrapped key is unwrapped once to check it fits the cipher, then
    /// dropped again.
    ///
    /// # Errors
    /// - Returns `Error::NotFound` if there is no registration file
    /// - Returns `Error::Crypto` if any key field is unusable
    pub fn load_registration(&mut self) -> Result<()> {
        let registration = Registration::load(&self.registration_path)?;

        if registration.algorithm != self.engine.variant() {
            warn!(
                configured = %self.engine.variant(),
                registered = %registration.algorithm,
                "Cipher differs from registration, using registered cipher"
            );
            self.engine = self.engine.with_variant(registration.algorithm);
        }

        let keypair = KeyPair::from_encoded(
            &decode(&registration.private_key)?,
            &decode(&registration.public_key)?,
        )?;
        let wrapped_key = decode(&registration.secret_key)?;

        let key = self.unwrap_key(&keypair, &wrapped_key)?;
        if key.len() != self.engine.variant().key_length() {
            return Err(Error::Crypto(format!(
                "Registered {} key has length {}",
                self.engine.variant(),
                key.len()
            )));
        }

        debug!(id = %registration.id, path = %self.registration_path.display(), "Registration loaded");

        self.keys = Some(VaultKeys {
            registration,
            keypair,
            wrapped_key,
        });
        self.state = VaultState::Loaded;
        Ok(())
    }

    /// Encrypt, sign and write `records` as the whole vault.
    ///
    /// # Postconditions
    /// - The vault file holds a fresh envelope; the previous one is replaced
    ///   atomically
    ///
    /// # Errors
    /// - Returns `Error::Crypto` if not initialized or any crypto step fails
    /// - Returns `Error::Io` if the file cannot be written
    pub fn encrypt(&self, records: &[Record]) -> Result<()> {
        let keys = self.keys()?;

        let plaintext = serde_json::to_string(records)?;
        let signature = keys.keypair.sign(&plaintext, self.signature_algorithm)?;

        let key = self.unwrap_key(&keys.keypair, &keys.wrapped_key)?;
        let ciphertext = self.engine.encrypt(key.as_bytes(), plaintext.as_bytes())?;

        let envelope = VaultEnvelope {
            signature,
            payload: encode(ciphertext),
            secret_key: keys.registration.secret_key.clone(),
        };

        let (store, name) = self.vault_location(keys)?;
        store.write(&name, &envelope.to_json()?)?;

        info!(records = records.len(), path = %store.path(&name).display(), "Vault written");
        Ok(())
    }

    /// Read, decrypt and verify the vault.
    ///
    /// # Returns
    /// - An empty list if no vault has been written yet
    ///
    /// # Errors
    /// - Returns `Error::Crypto` if not initialized or decryption fails
    /// - Returns `Error::Tampered` if the envelope carries a key other than
    ///   the registration's, or the signature does not verify over the
    ///   decrypted payload
    /// - Returns `Error::Serialization` or `Error::Validation` if the
    ///   verified payload is not a list of records
    pub fn load_vault(&mut self) -> Result<Vec<Record>> {
        let keys = self.keys()?;
        let (store, name) = self.vault_location(keys)?;

        let Some(contents) = store.read_optional(&name)? else {
            debug!(path = %store.path(&name).display(), "No vault file yet");
            self.state = VaultState::Loaded;
            return Ok(Vec::new());
        };

        let envelope = VaultEnvelope::from_json(&contents)?;
        if envelope.secret_key != keys.registration.secret_key {
            return Err(Error::Tampered(
                "Vault key does not belong to this registration".to_string(),
            ));
        }
        let key = self.unwrap_key(&keys.keypair, &keys.wrapped_key)?;
        let plaintext = self.engine.decrypt(key.as_bytes(), &decode(&envelope.payload)?)?;

        let plaintext = String::from_utf8(plaintext)
            .map_err(|_| Error::Tampered("Vault payload is not valid UTF-8".to_string()))?;

        match keys
            .keypair
            .verify(&plaintext, &envelope.signature, self.signature_algorithm)
        {
            Ok(true) => {}
            Ok(false) => {
                return Err(Error::Tampered(
                    "Vault signature does not match its contents".to_string(),
                ));
            }
            Err(e) => {
                return Err(Error::Tampered(format!("Vault signature is unusable: {}", e)));
            }
        }

        let records: Vec<Record> = serde_json::from_str(&plaintext).map_err(json_error)?;
        debug!(records = records.len(), "Vault loaded");

        self.state = VaultState::Loaded;
        Ok(records)
    }

    /// Sign `payload` with the registration keypair.
    pub fn sign(&self, payload: &str) -> Result<String> {
        self.keys()?.keypair.sign(payload, self.signature_algorithm)
    }

    /// The persisted registration document.
    pub fn registration(&self) -> Option<&Registration> {
        self.keys.as_ref().map(|keys| &keys.registration)
    }

    /// Path of the vault file.
    pub fn vault_path(&self) -> Result<PathBuf> {
        let keys = self.keys()?;
        let (store, name) = self.vault_location(keys)?;
        Ok(store.path(&name))
    }

    pub fn registration_path(&self) -> &Path {
        &self.registration_path
    }

    pub fn state(&self) -> VaultState {
        self.state
    }

    pub fn engine(&self) -> &CryptoEngine {
        &self.engine
    }

    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        self.signature_algorithm
    }

    fn keys(&self) -> Result<&VaultKeys> {
        self.keys
            .as_ref()
            .ok_or_else(|| Error::Crypto("Vault crypto is not initialized".to_string()))
    }

    fn unwrap_key(&self, keypair: &KeyPair, wrapped_key: &[u8]) -> Result<SensitiveBytes> {
        self.engine
            .decrypt_asymmetric(keypair.private_key(), wrapped_key)
            .map(SensitiveBytes::new)
    }

    /// The vault file lives next to the registration, named by its id.
    fn vault_location(&self, keys: &VaultKeys) -> Result<(LocalStore, String)> {
        let (registration_dir, _) = locate(&self.registration_path)?;
        Ok((registration_dir, keys.registration.id.to_string()))
    }
}

impl std::fmt::Debug for VaultCrypto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultCrypto")
            .field("registration_path", &self.registration_path)
            .field("state", &self.state)
            .field("variant", &self.engine.variant())
            .finish_non_exhaustive()
    }
}
