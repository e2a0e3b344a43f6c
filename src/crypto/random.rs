//! Secure random number generation.
//!
//! Provides OS-backed random bytes for temp-key nonces and the uniform
//! certificate choice made during the handshake.

use rand::seq::SliceRandom;
use rand::RngCore;
use rand_core::OsRng;

/// Cryptographically secure random number generator.
///
/// Wraps the OS-provided entropy source (e.g., /dev/urandom on Unix,
/// BCryptGenRandom on Windows).
pub struct SecureRandom;

impl SecureRandom {
    /// Fill a buffer with cryptographically secure random bytes.
    pub fn fill(dest: &mut [u8]) {
        OsRng.fill_bytes(dest);
    }

    /// Generate a fixed-size array of random bytes.
    pub fn bytes<const N: usize>() -> [u8; N] {
        let mut buf = [0u8; N];
        Self::fill(&mut buf);
        buf
    }

    /// Pick one element uniformly at random.
    pub fn choose<T>(items: &[T]) -> Option<&T> {
        items.choose(&mut OsRng)
    }
}
