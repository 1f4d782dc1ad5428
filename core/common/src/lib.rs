//! Common utilities and types shared across KeeVault modules.
//!
//! This module provides the error type every other crate reports through and
//! a couple of small value types used at crate boundaries.

pub mod error;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use types::{RegistrationId, SensitiveBytes};
