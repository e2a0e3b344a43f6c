//! Cryptographic primitives for HTTPC.
//!
//! This module provides:
//! - The SHA-256 hash-chain keystream and its XOR `apply`
//! - Temp-key derivation for the server's session registry
//! - Secure random number generation
//!
//! The cipher is unauthenticated and deterministic per seed. It offers no
//! integrity protection and no forward secrecy.

mod keys;
mod keystream;
mod random;

pub use keys::{derive_temp_key, generate_temp_key};
pub use keystream::{apply, apply_in_place, Keystream};
pub use random::SecureRandom;

/// Size of one keystream block (SHA-256 output)
pub const BLOCK_SIZE: usize = 32;

/// Size of the random nonce mixed into each temp key
pub const NONCE_SIZE: usize = 16;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layers_commute() {
        // XOR layers commute; the envelope codec still fixes a peeling order.
        let plaintext = b"Hello, overlay!";
        let inner = generate_temp_key("127.0.0.1");
        let outer = "s1";

        let sealed = apply(&apply(plaintext, &inner), outer);
        assert_ne!(sealed.as_slice(), plaintext.as_slice());

        let opened = apply(&apply(&sealed, outer), &inner);
        assert_eq!(opened.as_slice(), plaintext.as_slice());

        let opened_reversed = apply(&apply(&sealed, &inner), outer);
        assert_eq!(opened_reversed.as_slice(), plaintext.as_slice());
    }
}
