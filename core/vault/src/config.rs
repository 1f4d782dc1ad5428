//! Vault settings.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use keevault_common::{Error, Result};
use keevault_crypto::{CipherVariant, SignatureAlgorithm};

/// Environment variable overriding the home directory.
pub const HOME_ENV: &str = "KEEVAULT_HOME";
/// Settings file name inside the home directory.
pub const SETTINGS_FILENAME: &str = "keevault.json";
/// Default home directory name under the user's home.
pub const DEFAULT_HOME_DIRNAME: &str = ".keestore";
/// Default registration file, relative to the home directory.
pub const DEFAULT_REGISTRATION_FILE: &str = "keevault/.registration";
/// Default RSA modulus size.
pub const DEFAULT_RSA_KEY_BITS: usize = 1024;

/// Installation settings.
///
/// Every field except `home` can come from `<home>/keevault.json`; fields
/// missing there take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Home directory. Never read from the settings file itself.
    #[serde(skip)]
    pub home: PathBuf,
    /// Registration file; relative paths resolve against `home`.
    pub registration_file: PathBuf,
    /// RSA modulus size for new registrations.
    pub rsa_key_bits: usize,
    /// Symmetric cipher for new registrations.
    pub cipher: CipherVariant,
    /// Signature algorithm for the vault envelope.
    pub signature_algorithm: SignatureAlgorithm,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            home: PathBuf::new(),
            registration_file: PathBuf::from(DEFAULT_REGISTRATION_FILE),
            rsa_key_bits: DEFAULT_RSA_KEY_BITS,
            cipher: CipherVariant::default(),
            signature_algorithm: SignatureAlgorithm::default(),
        }
    }
}

impl Settings {
    /// Default settings rooted at `home`.
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            ..Self::default()
        }
    }

    /// Resolve the home directory and load its settings file.
    ///
    /// The home directory is `home` if given, else `$KEEVAULT_HOME`, else
    /// `~/.keestore`.
    ///
    /// # Errors
    /// - Returns `Error::NotFound` if no home directory can be determined
    /// - Returns `Error::Serialization` if the settings file is malformed
    pub fn load(home: Option<PathBuf>) -> Result<Self> {
        let home = match home {
            Some(home) => home,
            None => default_home()?,
        };
        Self::load_from(home)
    }

    /// Load settings from `<home>/keevault.json`, or defaults if absent.
    pub fn load_from(home: impl Into<PathBuf>) -> Result<Self> {
        let home = home.into();
        let path = home.join(SETTINGS_FILENAME);

        let mut settings = match fs::read_to_string(&path) {
            Ok(contents) => {
                debug!(path = %path.display(), "Loading settings");
                serde_json::from_str::<Settings>(&contents)?
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Settings::default(),
            Err(e) => return Err(Error::Io(e)),
        };
        settings.home = home;
        settings.validate()?;
        Ok(settings)
    }

    /// Absolute path of the registration file.
    pub fn registration_path(&self) -> PathBuf {
        self.home.join(&self.registration_file)
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    fn validate(&self) -> Result<()> {
        if self.rsa_key_bits < 512 {
            return Err(Error::Validation(format!(
                "rsaKeyBits too small: {}",
                self.rsa_key_bits
            )));
        }
        Ok(())
    }
}

fn default_home() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    dirs::home_dir()
        .map(|dir| dir.join(DEFAULT_HOME_DIRNAME))
        .ok_or_else(|| Error::NotFound("Cannot determine home directory".to_string()))
}
