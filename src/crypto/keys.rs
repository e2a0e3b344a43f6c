//! Temp-key derivation.
//!
//! A temp key is `hex(SHA-256(peer_key ∥ current_time ∥ random_nonce))`. It is
//! only ever used as a keystream seed, so its hex form is the key itself.

use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

use crate::crypto::{SecureRandom, NONCE_SIZE};

/// Derive a temp key from its three inputs.
pub fn derive_temp_key(peer_key: &str, timestamp_nanos: u128, nonce: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(peer_key.as_bytes());
    hasher.update(timestamp_nanos.to_string().as_bytes());
    hasher.update(nonce);
    hex::encode(hasher.finalize())
}

/// Issue a fresh temp key for `peer_key` using the wall clock and OS entropy.
pub fn generate_temp_key(peer_key: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let nonce: [u8; NONCE_SIZE] = SecureRandom::bytes();
    derive_temp_key(peer_key, now, &nonce)
}
