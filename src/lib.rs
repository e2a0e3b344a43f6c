//! # HTTPC
//!
//! An opportunistic, fail-open secure request channel layered in front of
//! plain HTTP.
//!
//! A client that shares a pre-distributed certificate with the server wraps
//! each request in two keystream layers: an outer layer keyed by the shared
//! seed and an inner layer keyed by a short-lived temp key that the server
//! rotates every few requests. When no certificate is shared, or anything on
//! the secure path goes wrong, the client silently repeats the request over
//! plain HTTP.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │          Client (fail-open)  /  Server (dual listener)  │
//! ├─────────────────────────────────────────────────────────┤
//! │  Protocol (handshake tokens, envelope, rotation record) │
//! ├─────────────────────────────────────────────────────────┤
//! │  Certificates (id → seed, periodic directory refresh)   │
//! ├─────────────────────────────────────────────────────────┤
//! │  Crypto Layer (SHA-256 hash-chain keystream, temp keys) │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Note
//!
//! The keystream is an unauthenticated XOR stream that restarts from the same
//! seed on every message. It hides payloads from casual observation only; it
//! is not a confidentiality or integrity guarantee, and a fallback response is
//! indistinguishable from a secure one at the caller's level.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod certs;
pub mod client;
pub mod crypto;
pub mod error;
pub mod http;
pub mod protocol;

#[cfg(feature = "server")]
pub mod server;

pub use error::{Error, Result};

/// Default port of the HTTPC listener
pub const DEFAULT_SECURE_PORT: u16 = 228;

/// Default port of the plain HTTP listener
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Requests allowed per temp key before the server rotates it
pub const DEFAULT_MAX_USES: u32 = 5;

/// Largest payload accepted in one direction
pub const MAX_PAYLOAD_SIZE: usize = 65_535;

/// Default client-side handshake timeout (milliseconds)
pub const HANDSHAKE_TIMEOUT_MS: u64 = 1_000;
