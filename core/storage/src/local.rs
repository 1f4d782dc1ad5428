//! Local filesystem document store.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use keevault_common::{Error, Result};

/// Directory of single-line JSON documents addressed by file name.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create a store rooted at `root`.
    ///
    /// # Postconditions
    /// - Root directory is created if it doesn't exist
    ///
    /// # Errors
    /// - Permission denied or other I/O failure creating the directory
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        if !root.exists() {
            fs::create_dir_all(&root)?;
        }

        Ok(Self { root })
    }

    /// Open a store rooted at `root` without touching the filesystem.
    pub fn at(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of the document `name`.
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Check whether the document exists.
    pub fn exists(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    /// Read a document.
    ///
    /// Documents are a single JSON line; anything after the first line is
    /// ignored.
    ///
    /// # Errors
    /// - `Error::NotFound` if the document doesn't exist
    /// - `Error::Io` for any other read failure
    pub fn read(&self, name: &str) -> Result<String> {
        check_name(name)?;
        let path = self.path(name);

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!("File not found: {}", path.display())));
            }
            Err(e) => return Err(Error::Io(e)),
        };

        debug!(path = %path.display(), size = contents.len(), "Document read");
        Ok(contents.lines().next().unwrap_or_default().to_string())
    }

    /// Read a document, or `None` if it doesn't exist.
    pub fn read_optional(&self, name: &str) -> Result<Option<String>> {
        match self.read(name) {
            Ok(contents) => Ok(Some(contents)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Replace a document atomically.
    ///
    /// The contents go to a temp file in the same directory, which is flushed
    /// and fsynced before being renamed over the target. The temp file is
    /// created owner-only (0600 on Unix) and keeps that mode.
    ///
    /// # Errors
    /// - `Error::Io` if any step fails; the previous document is left intact
    pub fn write(&self, name: &str, contents: &str) -> Result<()> {
        check_name(name)?;
        let path = self.path(name);

        let mut temp_file = tempfile::NamedTempFile::new_in(&self.root)?;
        temp_file.write_all(contents.as_bytes())?;
        temp_file.write_all(b"\n")?;
        // Flush and fsync so the rename, if it succeeds, always points to a
        // complete file.
        temp_file.flush()?;
        temp_file.as_file().sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = temp_file.as_file().metadata()?.permissions();
            perms.set_mode(0o600);
            temp_file.as_file().set_permissions(perms)?;
        }

        temp_file.persist(&path).map_err(|e| Error::Io(e.error))?;

        debug!(path = %path.display(), size = contents.len(), "Document written");
        Ok(())
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        return Err(Error::Validation(format!("Invalid document name: {:?}", name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use keevault_common::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path()).unwrap();

        assert!(!store.exists("doc"));
        store.write("doc", r#"{"a":"b"}"#).unwrap();
        assert!(store.exists("doc"));
        assert_eq!(store.read("doc").unwrap(), r#"{"a":"b"}"#);
    }

    #[test]
    fn test_overwrite_replaces_whole_document() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path()).unwrap();

        store.write("doc", "a much longer first version").unwrap();
        store.write("doc", "short").unwrap();
        assert_eq!(store.read("doc").unwrap(), "short");

        // No temp files left behind
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_read_missing() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path()).unwrap();

        let err = store.read("missing").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(err.kind(), ErrorKind::IoFailure);
        assert!(store.read_optional("missing").unwrap().is_none());
    }

    #[test]
    fn test_creates_root() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = LocalStore::new(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(store.root(), nested.as_path());
    }

    #[test]
    fn test_rejects_path_names() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path()).unwrap();
        assert!(store.write("../escape", "x").is_err());
        assert!(store.read("a/b").is_err());
        assert!(store.write("", "x").is_err());
    }

    #[test]
    fn test_write_into_missing_root_fails() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::at(dir.path().join("absent"));
        let err = store.write("doc", "x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoFailure);
    }

    #[cfg(unix)]
    #[test]
    fn test_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path()).unwrap();
        store.write("doc", "secret").unwrap();

        let mode = fs::metadata(store.path("doc")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
