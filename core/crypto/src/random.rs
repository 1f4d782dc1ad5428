//! Secure random source shared by the crypto engine.
//!
//! The source is handed to the engine explicitly rather than living in a
//! global, so tests can substitute a seeded generator.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::fmt;

/// Mutex-guarded cryptographically secure RNG.
pub struct SecureRandom {
    rng: Mutex<StdRng>,
}

impl SecureRandom {
    /// Create a generator seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Create a deterministic generator.
    ///
    /// # Security
    /// Only for tests and reproducible fixtures; the output is predictable.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Fill `buf` with random bytes.
    pub fn fill_bytes(&self, buf: &mut [u8]) {
        self.rng.lock().fill_bytes(buf);
    }

    /// Generate `size` random bytes.
    pub fn bytes(&self, size: usize) -> Vec<u8> {
        let mut buf = vec![0u8; size];
        self.fill_bytes(&mut buf);
        buf
    }

    /// Run `f` with exclusive access to the underlying generator.
    pub(crate) fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock();
        f(&mut rng)
    }
}

impl Default for SecureRandom {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl fmt::Debug for SecureRandom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureRandom")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_length() {
        let random = SecureRandom::from_entropy();
        assert_eq!(random.bytes(0).len(), 0);
        assert_eq!(random.bytes(33).len(), 33);
    }

    #[test]
    fn test_entropy_differs() {
        let random = SecureRandom::from_entropy();
        assert_ne!(random.bytes(32), random.bytes(32));
    }

    #[test]
    fn test_seeded_is_deterministic() {
        let a = SecureRandom::seeded(7);
        let b = SecureRandom::seeded(7);
        assert_eq!(a.bytes(16), b.bytes(16));
    }
}
