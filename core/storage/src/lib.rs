//! Local document storage for KeeVault.
//!
//! Registration and vault files are small single-document JSON files kept
//! side by side in one directory. Every write replaces the whole document
//! atomically (temp file, fsync, rename), so a crash leaves either the old
//! or the new document behind, never a partial one.

pub mod local;

pub use local::LocalStore;
