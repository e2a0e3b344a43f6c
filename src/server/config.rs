//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_HTTP_PORT, DEFAULT_MAX_USES, DEFAULT_SECURE_PORT, MAX_PAYLOAD_SIZE};

/// Default body of the placeholder `200 OK` response.
pub const DEFAULT_RESPONSE_BODY: &str = "Hello from HTTPC";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address
    pub listen_addr: String,
    /// Port of the HTTPC listener
    pub secure_port: u16,
    /// Port of the plain HTTP listener
    pub http_port: u16,
    /// Directory of `.cat` certificate files
    pub cert_dir: PathBuf,
    /// How often the certificate directory is re-read
    pub refresh_interval: Duration,
    /// Requests allowed per temp key before rotation
    pub max_uses: u32,
    /// Largest accepted request payload
    pub max_payload_size: usize,
    /// Deadline for the client's id list
    pub handshake_timeout: Duration,
    /// Deadline for reading a request payload
    pub io_timeout: Duration,
    /// Evict sessions idle this long; `None` keeps them until rotation
    pub idle_timeout: Option<Duration>,
    /// Body of the placeholder response
    pub response_body: String,
}

impl ServerConfig {
    /// Create a configuration with default ports and limits.
    pub fn new(listen_addr: impl Into<String>, cert_dir: impl Into<PathBuf>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            secure_port: DEFAULT_SECURE_PORT,
            http_port: DEFAULT_HTTP_PORT,
            cert_dir: cert_dir.into(),
            refresh_interval: Duration::from_secs(300),
            max_uses: DEFAULT_MAX_USES,
            max_payload_size: MAX_PAYLOAD_SIZE,
            handshake_timeout: Duration::from_secs(5),
            io_timeout: Duration::from_secs(10),
            idle_timeout: None,
            response_body: DEFAULT_RESPONSE_BODY.to_string(),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_addr.is_empty() {
            return Err("listen_addr cannot be empty".into());
        }
        if self.secure_port == self.http_port && self.secure_port != 0 {
            return Err("secure_port and http_port must differ".into());
        }
        if self.max_uses == 0 {
            return Err("max_uses must be at least 1".into());
        }
        if self.max_payload_size == 0 {
            return Err("max_payload_size must be non-zero".into());
        }
        if self.refresh_interval.is_zero() {
            return Err("refresh_interval must be non-zero".into());
        }
        Ok(())
    }
}

/// Configuration file format for serialization.
#[derive(Debug, Serialize, Deserialize)]
pub struct ServerConfigFile {
    /// Listen address
    pub listen_addr: String,
    /// HTTPC listener port
    #[serde(default = "default_secure_port")]
    pub secure_port: u16,
    /// Plain HTTP listener port
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Certificate directory
    pub cert_dir: PathBuf,
    /// Refresh interval (seconds)
    #[serde(default = "default_refresh_secs")]
    pub refresh_interval_secs: u64,
    /// Requests per temp key
    #[serde(default = "default_max_uses")]
    pub max_uses: u32,
    /// Largest accepted request payload (bytes)
    #[serde(default = "default_max_payload")]
    pub max_payload_size: usize,
    /// Handshake timeout (milliseconds)
    #[serde(default = "default_handshake_ms")]
    pub handshake_timeout_ms: u64,
    /// Payload read timeout (milliseconds)
    #[serde(default = "default_io_ms")]
    pub io_timeout_ms: u64,
    /// Idle session expiry (seconds); absent disables expiry
    #[serde(default)]
    pub idle_timeout_secs: Option<u64>,
    /// Placeholder response body
    #[serde(default = "default_body")]
    pub response_body: String,
}

fn default_secure_port() -> u16 {
    DEFAULT_SECURE_PORT
}

fn default_http_port() -> u16 {
    DEFAULT_HTTP_PORT
}

fn default_refresh_secs() -> u64 {
    300
}

fn default_max_uses() -> u32 {
    DEFAULT_MAX_USES
}

fn default_max_payload() -> usize {
    MAX_PAYLOAD_SIZE
}

fn default_handshake_ms() -> u64 {
    5_000
}

fn default_io_ms() -> u64 {
    10_000
}

fn default_body() -> String {
    DEFAULT_RESPONSE_BODY.to_string()
}

impl ServerConfigFile {
    /// Convert to runtime configuration.
    pub fn to_config(&self) -> Result<ServerConfig, String> {
        let config = ServerConfig {
            listen_addr: self.listen_addr.clone(),
            secure_port: self.secure_port,
            http_port: self.http_port,
            cert_dir: self.cert_dir.clone(),
            refresh_interval: Duration::from_secs(self.refresh_interval_secs),
            max_uses: self.max_uses,
            max_payload_size: self.max_payload_size,
            handshake_timeout: Duration::from_millis(self.handshake_timeout_ms),
            io_timeout: Duration::from_millis(self.io_timeout_ms),
            idle_timeout: self.idle_timeout_secs.map(Duration::from_secs),
            response_body: self.response_body.clone(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Create from runtime configuration.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            listen_addr: config.listen_addr.clone(),
            secure_port: config.secure_port,
            http_port: config.http_port,
            cert_dir: config.cert_dir.clone(),
            refresh_interval_secs: config.refresh_interval.as_secs(),
            max_uses: config.max_uses,
            max_payload_size: config.max_payload_size,
            handshake_timeout_ms: config.handshake_timeout.as_millis() as u64,
            io_timeout_ms: config.io_timeout.as_millis() as u64,
            idle_timeout_secs: config.idle_timeout.map(|d| d.as_secs()),
            response_body: config.response_body.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ServerConfig::new("0.0.0.0", "./cert");
        assert!(config.validate().is_ok());
        assert_eq!(config.secure_port, 228);
        assert_eq!(config.http_port, 80);
        assert_eq!(config.max_uses, 5);
        assert!(config.idle_timeout.is_none());
    }

    #[test]
    fn test_config_serialization() {
        let mut config = ServerConfig::new("0.0.0.0", "./cert");
        config.idle_timeout = Some(Duration::from_secs(600));

        let file = ServerConfigFile::from_config(&config);
        let text = toml::to_string_pretty(&file).unwrap();
        let parsed: ServerConfigFile = toml::from_str(&text).unwrap();
        let restored = parsed.to_config().unwrap();

        assert_eq!(config.listen_addr, restored.listen_addr);
        assert_eq!(config.secure_port, restored.secure_port);
        assert_eq!(config.cert_dir, restored.cert_dir);
        assert_eq!(restored.idle_timeout, Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_minimal_file_uses_defaults() {
        let parsed: ServerConfigFile = toml::from_str(
            r#"
            listen_addr = "127.0.0.1"
            cert_dir = "/etc/httpc/cert"
            "#,
        )
        .unwrap();
        let config = parsed.to_config().unwrap();

        assert_eq!(config.secure_port, DEFAULT_SECURE_PORT);
        assert_eq!(config.max_uses, DEFAULT_MAX_USES);
        assert_eq!(config.handshake_timeout, Duration::from_secs(5));
        assert_eq!(config.response_body, DEFAULT_RESPONSE_BODY);
    }

    #[test]
    fn test_validation() {
        let config = ServerConfig::new("", "./cert");
        assert!(config.validate().is_err());

        let mut config = ServerConfig::new("0.0.0.0", "./cert");
        config.http_port = config.secure_port;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::new("0.0.0.0", "./cert");
        config.max_uses = 0;
        assert!(config.validate().is_err());
    }
}
