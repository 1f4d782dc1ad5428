//! First-run bootstrap of the vault crypto.

use tracing::info;

use crate::config::Settings;
use crate::manager::VaultCrypto;
use keevault_common::Result;
use keevault_crypto::{encode, CryptoEngine};

/// Keypair algorithm for new registrations.
const KEYPAIR_ALGORITHM: &str = "RSA";

/// Loads the registration, or creates one on first run.
#[derive(Debug)]
pub struct VaultCryptoInitializer {
    settings: Settings,
    engine: CryptoEngine,
}

impl VaultCryptoInitializer {
    pub fn new(settings: Settings, engine: CryptoEngine) -> Self {
        Self { settings, engine }
    }

    /// Whether a registration already exists.
    pub fn is_registered(&self) -> bool {
        self.settings.registration_path().is_file()
    }

    /// Initialize the vault crypto and hand it to `on_initialized`.
    ///
    /// A missing registration is created from a random secret; an existing
    /// one is loaded. The callback runs only on success.
    ///
    /// # Errors
    /// - Any failure loading or creating the registration; nothing is
    ///   retried and the callback is not invoked
    pub fn initialize<F>(self, on_initialized: F) -> Result<VaultCrypto>
    where
        F: FnOnce(&VaultCrypto),
    {
        let path = self.settings.registration_path();
        let algorithm = self.settings.signature_algorithm;

        let vault = if self.is_registered() {
            VaultCrypto::open(self.engine, path, algorithm)?
        } else {
            info!(path = %path.display(), "No registration found, creating one");
            let secret = encode(self.engine.random_key().as_bytes());
            let material =
                self.engine
                    .create_crypto(&secret, KEYPAIR_ALGORITHM, self.settings.rsa_key_bits)?;
            VaultCrypto::create(self.engine, material, path, algorithm)?
        };

        on_initialized(&vault);
        Ok(vault)
    }
}
