//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_HTTP_PORT, DEFAULT_MAX_USES, DEFAULT_SECURE_PORT, HANDSHAKE_TIMEOUT_MS, MAX_PAYLOAD_SIZE};

/// Configuration for an HTTPC client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server host name or address
    pub server_addr: String,

    /// Port of the HTTPC listener
    #[serde(default = "default_secure_port")]
    pub secure_port: u16,

    /// Port of the plain HTTP listener
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Directory of `.cat` certificate files
    #[serde(default = "default_cert_dir")]
    pub cert_dir: PathBuf,

    /// Deadline for connecting and for each handshake read (milliseconds)
    #[serde(default = "default_handshake_ms")]
    pub handshake_timeout_ms: u64,

    /// Deadline for a payload round trip (milliseconds)
    #[serde(default = "default_io_ms")]
    pub io_timeout_ms: u64,

    /// Requests sent per temp key before asking for a new one
    #[serde(default = "default_max_uses")]
    pub max_uses: u32,

    /// Largest response accepted
    #[serde(default = "default_max_response")]
    pub max_response_size: usize,
}

fn default_secure_port() -> u16 {
    DEFAULT_SECURE_PORT
}

fn default_http_port() -> u16 {
    DEFAULT_HTTP_PORT
}

fn default_cert_dir() -> PathBuf {
    PathBuf::from("./keys")
}

fn default_handshake_ms() -> u64 {
    HANDSHAKE_TIMEOUT_MS
}

fn default_io_ms() -> u64 {
    5_000
}

fn default_max_uses() -> u32 {
    DEFAULT_MAX_USES
}

fn default_max_response() -> usize {
    MAX_PAYLOAD_SIZE
}

impl ClientConfig {
    /// Create a configuration with default ports and limits.
    pub fn new(server_addr: impl Into<String>) -> Self {
        Self {
            server_addr: server_addr.into(),
            secure_port: DEFAULT_SECURE_PORT,
            http_port: DEFAULT_HTTP_PORT,
            cert_dir: default_cert_dir(),
            handshake_timeout_ms: HANDSHAKE_TIMEOUT_MS,
            io_timeout_ms: default_io_ms(),
            max_uses: DEFAULT_MAX_USES,
            max_response_size: MAX_PAYLOAD_SIZE,
        }
    }

    /// Set both listener ports.
    pub fn with_ports(mut self, secure_port: u16, http_port: u16) -> Self {
        self.secure_port = secure_port;
        self.http_port = http_port;
        self
    }

    /// Handshake timeout as a [`Duration`].
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Payload timeout as a [`Duration`].
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.server_addr.is_empty() {
            return Err("server_addr cannot be empty".to_string());
        }
        if self.max_uses == 0 {
            return Err("max_uses must be at least 1".to_string());
        }
        if self.handshake_timeout_ms == 0 || self.io_timeout_ms == 0 {
            return Err("timeouts must be non-zero".to_string());
        }
        if self.max_response_size == 0 {
            return Err("max_response_size must be non-zero".to_string());
        }
        Ok(())
    }
}
