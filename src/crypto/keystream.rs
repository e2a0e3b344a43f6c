//! SHA-256 hash-chain keystream.
//!
//! `block₀ = SHA-256(seed)`, `blockᵢ₊₁ = SHA-256(blockᵢ)`. The keystream is the
//! concatenation of blocks and is XORed byte-for-byte against the payload.
//! There is no integrity protection and identical seeds always produce the
//! identical keystream.

use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::BLOCK_SIZE;

/// Pull-based keystream source.
///
/// Holds the current hash block and a read offset into it; the block is
/// re-hashed in place once exhausted.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Keystream {
    block: [u8; BLOCK_SIZE],
    offset: usize,
}

impl Keystream {
    /// Start a keystream at the beginning of `seed`.
    pub fn new(seed: impl AsRef<[u8]>) -> Self {
        Self {
            block: Sha256::digest(seed.as_ref()).into(),
            offset: 0,
        }
    }

    fn advance(&mut self) {
        self.block = Sha256::digest(self.block).into();
        self.offset = 0;
    }

    /// XOR the next `buf.len()` keystream bytes into `buf`.
    pub fn xor_into(&mut self, buf: &mut [u8]) {
        let mut pos = 0;
        while pos < buf.len() {
            if self.offset == BLOCK_SIZE {
                self.advance();
            }
            let take = (BLOCK_SIZE - self.offset).min(buf.len() - pos);
            for (b, k) in buf[pos..pos + take]
                .iter_mut()
                .zip(&self.block[self.offset..self.offset + take])
            {
                *b ^= k;
            }
            self.offset += take;
            pos += take;
        }
    }

    /// Fill `out` with raw keystream bytes.
    pub fn fill(&mut self, out: &mut [u8]) {
        out.fill(0);
        self.xor_into(out);
    }
}

impl Iterator for Keystream {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.offset == BLOCK_SIZE {
            self.advance();
        }
        let b = self.block[self.offset];
        self.offset += 1;
        Some(b)
    }
}

/// XOR `data` against the keystream for `seed`.
///
/// The keystream restarts for every call, so the function is its own inverse.
pub fn apply(data: &[u8], seed: impl AsRef<[u8]>) -> Vec<u8> {
    let mut out = data.to_vec();
    apply_in_place(&mut out, seed);
    out
}

/// In-place variant of [`apply`].
pub fn apply_in_place(data: &mut [u8], seed: impl AsRef<[u8]>) {
    Keystream::new(seed).xor_into(data);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_block_is_seed_digest() {
        let mut ks = Keystream::new("s1");
        let mut out = [0u8; BLOCK_SIZE];
        ks.fill(&mut out);

        let expected: [u8; BLOCK_SIZE] = Sha256::digest(b"s1").into();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_second_block_chains() {
        let mut ks = Keystream::new("s1");
        let mut out = [0u8; 2 * BLOCK_SIZE];
        ks.fill(&mut out);

        let b0: [u8; BLOCK_SIZE] = Sha256::digest(b"s1").into();
        let b1: [u8; BLOCK_SIZE] = Sha256::digest(b0).into();
        assert_eq!(&out[..BLOCK_SIZE], &b0);
        assert_eq!(&out[BLOCK_SIZE..], &b1);
    }

    #[test]
    fn test_iterator_matches_fill() {
        let from_iter: Vec<u8> = Keystream::new("seed").take(100).collect();
        let mut filled = vec![0u8; 100];
        Keystream::new("seed").fill(&mut filled);
        assert_eq!(from_iter, filled);
    }

    #[test]
    fn test_split_reads_match_single_read() {
        let mut whole = vec![0u8; 77];
        Keystream::new("seed").fill(&mut whole);

        let mut ks = Keystream::new("seed");
        let mut a = vec![0u8; 5];
        let mut b = vec![0u8; 40];
        let mut c = vec![0u8; 32];
        ks.fill(&mut a);
        ks.fill(&mut b);
        ks.fill(&mut c);

        assert_eq!([a, b, c].concat(), whole);
    }

    #[test]
    fn test_apply_self_inverse() {
        let samples: [&[u8]; 4] = [b"", b"x", b"GET / HTTP/1.1\r\nHost:x\r\n\r\n", &[0xAB; 1000]];
        for data in samples {
            let enc = apply(data, "s1");
            assert_eq!(enc.len(), data.len());
            assert_eq!(apply(&enc, "s1"), data);
        }
    }

    #[test]
    fn test_apply_is_deterministic() {
        let data = b"payload bytes";
        assert_eq!(apply(data, "k"), apply(data, "k"));
        assert_ne!(apply(data, "k"), apply(data, "other"));
    }

    #[test]
    fn test_prefix_property() {
        // Same seed, different lengths: shorter output is a prefix of the longer one.
        let short = apply(&[0u8; 10], "k");
        let long = apply(&[0u8; 90], "k");
        assert_eq!(&long[..10], short.as_slice());
    }

    #[test]
    fn test_empty_input() {
        assert!(apply(b"", "k").is_empty());
    }
}
