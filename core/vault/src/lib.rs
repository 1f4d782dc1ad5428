//! Vault engine for KeeVault.
//!
//! This module provides:
//! - Records and stores, the key-value model that gets persisted
//! - A mutex-guarded record collection for front ends
//! - Registration bootstrap and the signed, encrypted vault envelope
//!
//! # Architecture
//! [`VaultCrypto`] sits between the front end and the filesystem. It signs
//! the plaintext record list, encrypts it under the registration's wrapped
//! symmetric key and verifies the signature again on every load.

pub mod bootstrap;
pub mod collection;
pub mod config;
pub mod envelope;
mod json;
pub mod manager;
pub mod record;
pub mod registration;
pub mod store;

pub use bootstrap::VaultCryptoInitializer;
pub use collection::RecordCollection;
pub use config::Settings;
pub use envelope::VaultEnvelope;
pub use manager::{VaultCrypto, VaultState};
pub use record::{Record, ITEM_ID_KEY, ITEM_NAME_KEY};
pub use registration::Registration;
pub use store::{Store, STORE_ID_KEY, STORE_NAME_KEY};
