//! Registration file: the persisted crypto material of one installation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use keevault_common::{Error, RegistrationId, Result};
use keevault_crypto::CipherVariant;
use keevault_storage::LocalStore;

/// Contents of the registration file.
///
/// All key fields are standard base64. `secret_key` is the symmetric key
/// wrapped under the public key, never the raw key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: RegistrationId,
    /// Wrapped symmetric key.
    pub secret_key: String,
    /// X.509 SubjectPublicKeyInfo DER.
    pub public_key: String,
    /// PKCS#8 DER.
    pub private_key: String,
    pub salt: String,
    /// Cipher the wrapped key belongs to; absent in older files.
    #[serde(default)]
    pub algorithm: CipherVariant,
}

impl Registration {
    /// Read the registration at `path`.
    ///
    /// # Errors
    /// - Returns `Error::NotFound` if the file doesn't exist
    /// - Returns `Error::Serialization` if the file is malformed
    pub fn load(path: &Path) -> Result<Self> {
        let (store, name) = locate(path)?;
        let contents = store.read(&name)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write the registration to `path` atomically, creating its directory.
    pub fn save(&self, path: &Path) -> Result<()> {
        let (store, name) = locate(path)?;
        let store = LocalStore::new(store.root())?;
        store.write(&name, &serde_json::to_string(self)?)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("algorithm", &self.algorithm)
            .field("secret_key", &"[REDACTED]")
            .field("private_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Split a file path into the store holding it and the document name.
pub(crate) fn locate(path: &Path) -> Result<(LocalStore, String)> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::Validation(format!("Invalid file path: {}", path.display())))?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    Ok((LocalStore::at(dir), name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use keevault_common::ErrorKind;
    use tempfile::TempDir;

    fn sample() -> Registration {
        Registration {
            id: RegistrationId::new("reg-1").unwrap(),
            secret_key: "c2VjcmV0".to_string(),
            public_key: "cHVi".to_string(),
            private_key: "cHJpdg==".to_string(),
            salt: "AAAAAAAAAAA=".to_string(),
            algorithm: CipherVariant::Aes,
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("keevault").join(".registration");

        sample().save(&path).unwrap();
        assert_eq!(Registration::load(&path).unwrap(), sample());
    }

    #[test]
    fn test_field_names() {
        let json = serde_json::to_value(sample()).unwrap();
        for field in ["id", "secretKey", "publicKey", "privateKey", "salt", "algorithm"] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }
    }

    #[test]
    fn test_algorithm_defaults_to_aes() {
        let json = r#"{"id":"r","secretKey":"a","publicKey":"b","privateKey":"c","salt":"d"}"#;
        let registration: Registration = serde_json::from_str(json).unwrap();
        assert_eq!(registration.algorithm, CipherVariant::Aes);
    }

    #[test]
    fn test_load_missing() {
        let dir = TempDir::new().unwrap();
        let err = Registration::load(&dir.path().join("absent")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoFailure);
    }

    #[test]
    fn test_debug_redacts_keys() {
        let debug = format!("{:?}", sample());
        assert!(!debug.contains("cHJpdg=="));
        assert!(!debug.contains("c2VjcmV0"));
    }

    #[test]
    fn test_locate_relative_name() {
        let (store, name) = locate(Path::new(".registration")).unwrap();
        assert_eq!(store.root(), Path::new("."));
        assert_eq!(name, ".registration");
    }
}
