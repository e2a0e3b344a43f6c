//! Two-layer envelope codec.
//!
//! The inner layer is keyed by the temp key, the outer layer by the seed of
//! the negotiated certificate. Rotation rounds carry only the outer layer.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::apply;
use crate::error::Result;

/// Seal a payload: inner layer first, then outer.
pub fn encode_outbound(plaintext: &[u8], inner_key: &str, outer_seed: &str) -> Vec<u8> {
    apply(&apply(plaintext, inner_key), outer_seed)
}

/// Open a payload: peel the outer layer first, then inner.
pub fn decode_inbound(ciphertext: &[u8], outer_seed: &str, inner_key: &str) -> Vec<u8> {
    apply(&apply(ciphertext, outer_seed), inner_key)
}

/// Record delivered to the client on a rotation round.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationRecord {
    /// Newly issued temp key (hex)
    pub temp_key: String,
}

impl fmt::Debug for RotationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotationRecord")
            .field("temp_key", &"<redacted>")
            .finish()
    }
}

/// Serialize a rotation record and apply the single outer layer.
pub fn seal_rotation(temp_key: &str, outer_seed: &str) -> Result<Vec<u8>> {
    let record = RotationRecord {
        temp_key: temp_key.to_string(),
    };
    let json = serde_json::to_vec(&record)?;
    Ok(apply(&json, outer_seed))
}

/// Remove the outer layer and parse the rotation record.
pub fn open_rotation(ciphertext: &[u8], outer_seed: &str) -> Result<RotationRecord> {
    let json = apply(ciphertext, outer_seed);
    Ok(serde_json::from_slice(&json)?)
}
