//! Error types for the HTTPC protocol engine.
//!
//! On the client every variant is an internal reason for dropping to plain
//! HTTP; none of them reach the caller of [`crate::client::HttpcClient::request`].

use thiserror::Error;

/// Result type alias for HTTPC operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during HTTPC operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Greeting missing, selection reply malformed, or protocol violation
    #[error("handshake error: {0}")]
    Handshake(String),

    /// Server found no shared certificate and sent the fallback token
    #[error("server requested fallback")]
    Fallback,

    /// Certificate id unknown to the local store
    #[error("certificate not found: {0}")]
    CertificateNotFound(String),

    /// Invalid message format
    #[error("invalid message format: {0}")]
    InvalidMessage(String),

    /// Peer sent more than the configured limit
    #[error("payload exceeds {limit} bytes")]
    PayloadTooLarge {
        /// Configured limit in bytes
        limit: usize,
    },

    /// Operation timed out
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// Network I/O error
    #[error("network error: {0}")]
    Network(#[from] std::io::Error),

    /// Rotation record was not valid JSON
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a new handshake error
    pub fn handshake(msg: impl Into<String>) -> Self {
        Error::Handshake(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new invalid message error
    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidMessage(msg.into())
    }

    /// Check if this error came from an expired deadline
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }

    /// Check if the server explicitly asked for the plain path
    pub fn is_fallback_signal(&self) -> bool {
        matches!(self, Error::Fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Fallback;
        assert_eq!(err.to_string(), "server requested fallback");

        let err = Error::Timeout(1000);
        assert_eq!(err.to_string(), "timeout after 1000ms");

        let err = Error::PayloadTooLarge { limit: 16 };
        assert_eq!(err.to_string(), "payload exceeds 16 bytes");
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::Timeout(1000).is_timeout());
        assert!(!Error::Fallback.is_timeout());
        assert!(Error::Fallback.is_fallback_signal());
        assert!(!Error::handshake("bad greeting").is_fallback_signal());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: Error = io.into();
        assert!(matches!(err, Error::Network(_)));
    }
}
