//! Fail-open HTTPC client.
//!
//! Every request first tries the secure path:
//!
//! ```text
//! NO_SESSION ──► HANDSHAKE ──► ROTATE ──► HANDSHAKE ──► SEND ──► RECEIVE ──► done
//!     │              │            │            │           │          │
//!     └──────────────┴────────────┴─────┬──────┴───────────┴──────────┘
//!                                       ▼
//!                            FALLBACK ──► PLAIN_HTTP ──► done
//! ```
//!
//! `ensure_session` performs at most one rotation round and `send` performs
//! the enveloped exchange. Any error on either step discards the temp key and
//! the same call completes over plain HTTP, so callers only ever see an error
//! when the plain HTTP service itself is unreachable.
//!
//! Secure exchanges of one client run one at a time. An empty payload is the
//! server's signal to hand out a key, so it always goes over plain HTTP.

pub mod config;

pub use config::ClientConfig;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use zeroize::ZeroizeOnDrop;

use crate::certs::{Certificate, CertificateStore};
use crate::error::{Error, Result};
use crate::http::PLAIN_REQUEST;
use crate::protocol::{
    decode_inbound, encode_outbound, negotiate, open_rotation, read_to_end_limited, with_deadline,
};

/// How a response was obtained.
#[derive(Debug)]
pub enum Outcome {
    /// Response arrived over the enveloped channel
    Secure(Vec<u8>),
    /// Secure path failed; response came from the plain HTTP service
    Fallback {
        /// Why the secure path was abandoned
        reason: Error,
        /// Plain HTTP response
        response: Vec<u8>,
    },
}

impl Outcome {
    /// Check if the response came over the secure path.
    pub fn is_secure(&self) -> bool {
        matches!(self, Outcome::Secure(_))
    }

    /// Borrow the response bytes.
    pub fn response(&self) -> &[u8] {
        match self {
            Outcome::Secure(response) | Outcome::Fallback { response, .. } => response,
        }
    }

    /// Take the response bytes.
    pub fn into_response(self) -> Vec<u8> {
        match self {
            Outcome::Secure(response) | Outcome::Fallback { response, .. } => response,
        }
    }
}

#[derive(ZeroizeOnDrop)]
struct ClientSession {
    temp_key: String,
    #[zeroize(skip)]
    uses: u32,
}

/// Server answer to an enveloped request.
enum Reply {
    Response(Vec<u8>),
    /// Server issued a new key instead of answering
    Rotated(String),
}

/// HTTPC client.
pub struct HttpcClient {
    config: ClientConfig,
    store: Arc<CertificateStore>,
    session: Mutex<Option<ClientSession>>,
    /// Held across a whole secure exchange
    exchange_lock: tokio::sync::Mutex<()>,
}

impl HttpcClient {
    /// Create a new client with the given configuration and certificates.
    pub fn new(config: ClientConfig, store: Arc<CertificateStore>) -> Result<Self> {
        config.validate().map_err(Error::config)?;
        Ok(Self {
            config,
            store,
            session: Mutex::new(None),
            exchange_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Send `payload` and return the response.
    ///
    /// Secure-path failures are never reported; the response then comes from
    /// the plain HTTP service. The only error is that service failing too.
    pub async fn request(&self, payload: &[u8]) -> Result<Vec<u8>> {
        Ok(self.request_with_outcome(payload).await?.into_response())
    }

    /// Like [`request`](Self::request), but also reports which path answered.
    pub async fn request_with_outcome(&self, payload: &[u8]) -> Result<Outcome> {
        let secure = if payload.is_empty() {
            Err(Error::invalid("empty payload cannot be enveloped"))
        } else {
            self.secure_request(payload).await
        };

        match secure {
            Ok(response) => Ok(Outcome::Secure(response)),
            Err(reason) => {
                tracing::debug!("Falling back to plain HTTP: {}", reason);
                let response = self.plain_http().await?;
                Ok(Outcome::Fallback { reason, response })
            }
        }
    }

    /// Fetch the placeholder page from the plain HTTP service.
    pub async fn plain_http(&self) -> Result<Vec<u8>> {
        let io_timeout = self.config.io_timeout();
        let mut stream = self.connect(self.config.http_port, io_timeout).await?;

        with_deadline(io_timeout, async {
            stream.write_all(PLAIN_REQUEST).await?;
            read_to_end_limited(&mut stream, self.config.max_response_size).await
        })
        .await
    }

    /// Requests sent under the current temp key, if one is held.
    pub fn session_uses(&self) -> Option<u32> {
        self.session.lock().as_ref().map(|s| s.uses)
    }

    /// Drop the current temp key so the next request renegotiates one.
    pub fn reset_session(&self) {
        self.session.lock().take();
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn secure_request(&self, payload: &[u8]) -> Result<Vec<u8>> {
        // A concurrent rotation round would leave this exchange on a stale key.
        let _exchange = self.exchange_lock.lock().await;

        let result = self.try_secure(payload).await;
        if result.is_err() {
            self.reset_session();
        }
        result
    }

    async fn try_secure(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let temp_key = self.ensure_session().await?;

        match self.send(payload, &temp_key).await? {
            Reply::Response(response) => Ok(response),
            Reply::Rotated(fresh) => {
                tracing::debug!("Server rotated the temp key mid-session");
                self.install(fresh.clone());
                match self.send(payload, &fresh).await? {
                    Reply::Response(response) => Ok(response),
                    Reply::Rotated(_) => Err(Error::handshake("temp key rotated twice")),
                }
            }
        }
    }

    /// Return a temp key with budget left, running a rotation round if needed.
    async fn ensure_session(&self) -> Result<String> {
        if let Some(temp_key) = self.usable_key() {
            return Ok(temp_key);
        }

        let (mut stream, cert) = self.open_secure().await?;
        // An empty request tells the server to issue a key.
        let sealed = self.exchange(&mut stream, &[]).await?;
        let record = open_rotation(&sealed, &cert.seed)?;
        if record.temp_key.is_empty() {
            return Err(Error::invalid("empty temp key"));
        }

        tracing::debug!("Received new temp key via certificate {}", cert.id);
        self.install(record.temp_key.clone());
        Ok(record.temp_key)
    }

    async fn send(&self, payload: &[u8], temp_key: &str) -> Result<Reply> {
        let (mut stream, cert) = self.open_secure().await?;
        self.consume_use();

        let sealed = encode_outbound(payload, temp_key, &cert.seed);
        let raw = self.exchange(&mut stream, &sealed).await?;
        if raw.is_empty() {
            return Err(Error::invalid("server closed without a response"));
        }

        if let Ok(record) = open_rotation(&raw, &cert.seed) {
            return Ok(Reply::Rotated(record.temp_key));
        }
        Ok(Reply::Response(decode_inbound(&raw, &cert.seed, temp_key)))
    }

    /// Connect to the secure port and run the handshake.
    async fn open_secure(&self) -> Result<(TcpStream, Certificate)> {
        let step = self.config.handshake_timeout();
        let mut stream = self.connect(self.config.secure_port, step).await?;
        let cert = negotiate(&mut stream, &self.store, step).await?;
        Ok((stream, cert))
    }

    /// Write `outbound`, half-close, and read the reply to EOF.
    async fn exchange(&self, stream: &mut TcpStream, outbound: &[u8]) -> Result<Vec<u8>> {
        with_deadline(self.config.io_timeout(), async {
            stream.write_all(outbound).await?;
            stream.shutdown().await?;
            read_to_end_limited(&mut *stream, self.config.max_response_size).await
        })
        .await
    }

    async fn connect(&self, port: u16, limit: Duration) -> Result<TcpStream> {
        let addr = (self.config.server_addr.as_str(), port);
        let stream = with_deadline(limit, async { TcpStream::connect(addr).await.map_err(Error::from) }).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    fn usable_key(&self) -> Option<String> {
        let session = self.session.lock();
        session
            .as_ref()
            .filter(|s| s.uses < self.config.max_uses)
            .map(|s| s.temp_key.clone())
    }

    fn install(&self, temp_key: String) {
        *self.session.lock() = Some(ClientSession { temp_key, uses: 0 });
    }

    fn consume_use(&self) {
        if let Some(session) = self.session.lock().as_mut() {
            session.uses += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{http_response, read_request_head, MAX_HEAD_SIZE};
    use crate::protocol::{read_line, seal_rotation, MAX_LINE_LEN};
    use tokio::net::TcpListener;

    const PAGE: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nplain";

    /// Plain HTTP stub answering every connection with [`PAGE`].
    async fn plain_stub() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let _ = read_request_head(&mut stream, MAX_HEAD_SIZE).await;
                let _ = stream.write_all(PAGE).await;
                let _ = stream.shutdown().await;
            }
        });
        port
    }

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    fn client(secure_port: u16, http_port: u16, certs: Vec<Certificate>) -> HttpcClient {
        let config = ClientConfig::new("127.0.0.1").with_ports(secure_port, http_port);
        let store = Arc::new(CertificateStore::from_certificates(certs));
        HttpcClient::new(config, store).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let store = Arc::new(CertificateStore::new());
        let result = HttpcClient::new(ClientConfig::new(""), store);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_outcome_accessors() {
        let secure = Outcome::Secure(b"a".to_vec());
        assert!(secure.is_secure());
        assert_eq!(secure.response(), b"a");

        let fallback = Outcome::Fallback {
            reason: Error::Fallback,
            response: b"b".to_vec(),
        };
        assert!(!fallback.is_secure());
        assert_eq!(fallback.into_response(), b"b");
    }

    #[tokio::test]
    async fn test_unreachable_secure_port_falls_back() {
        let http_port = plain_stub().await;
        let client = client(closed_port().await, http_port, vec![Certificate::new("A", "s1")]);

        let outcome = client.request_with_outcome(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
        assert!(matches!(outcome, Outcome::Fallback { reason: Error::Network(_), .. }));
        assert_eq!(outcome.response(), PAGE);
        assert!(client.session_uses().is_none());
    }

    #[tokio::test]
    async fn test_fallback_token_returns_plain_page() {
        let http_port = plain_stub().await;
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let secure_port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"HTTPC-HELLO\n").await.unwrap();
            let _ids = read_line(&mut stream, MAX_LINE_LEN).await.unwrap();
            stream.write_all(b"HTTPC-FALLBACK\n").await.unwrap();
        });

        let client = client(secure_port, http_port, vec![]);
        let outcome = client.request_with_outcome(b"GET /").await.unwrap();
        assert!(matches!(outcome, Outcome::Fallback { reason: Error::Fallback, .. }));
        assert_eq!(client.request(b"GET /").await.unwrap(), PAGE);
    }

    #[tokio::test]
    async fn test_missing_greeting_falls_back() {
        let http_port = plain_stub().await;
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let secure_port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"SSH-2.0-OpenSSH\n").await.unwrap();
        });

        let client = client(secure_port, http_port, vec![Certificate::new("A", "s1")]);
        let outcome = client.request_with_outcome(b"GET /").await.unwrap();
        assert!(matches!(outcome, Outcome::Fallback { reason: Error::Handshake(_), .. }));
    }

    #[tokio::test]
    async fn test_rotation_then_secure_request() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let secure_port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            // Rotation round.
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"HTTPC-HELLO\n").await.unwrap();
            assert_eq!(read_line(&mut stream, MAX_LINE_LEN).await.unwrap(), "A");
            stream.write_all(b"HTTPC-USE:A\n").await.unwrap();
            let request = read_to_end_limited(&mut stream, 1024).await.unwrap();
            assert!(request.is_empty());
            stream.write_all(&seal_rotation("k1", "s1").unwrap()).await.unwrap();
            stream.shutdown().await.unwrap();

            // Request round.
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"HTTPC-HELLO\n").await.unwrap();
            read_line(&mut stream, MAX_LINE_LEN).await.unwrap();
            stream.write_all(b"HTTPC-USE:A\n").await.unwrap();
            let sealed = read_to_end_limited(&mut stream, 1024).await.unwrap();
            assert_eq!(decode_inbound(&sealed, "s1", "k1"), b"ping");

            let response = http_response(200, "OK", b"pong", "text/plain");
            stream
                .write_all(&encode_outbound(&response, "k1", "s1"))
                .await
                .unwrap();
            stream.shutdown().await.unwrap();
        });

        let client = client(secure_port, closed_port().await, vec![Certificate::new("A", "s1")]);
        let outcome = client.request_with_outcome(b"ping").await.unwrap();

        assert!(outcome.is_secure());
        assert!(outcome.response().starts_with(b"HTTP/1.1 200 OK"));
        assert!(outcome.response().ends_with(b"pong"));
        assert_eq!(client.session_uses(), Some(1));
    }

    #[tokio::test]
    async fn test_failure_after_handshake_discards_session() {
        let http_port = plain_stub().await;
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let secure_port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"HTTPC-HELLO\n").await.unwrap();
            read_line(&mut stream, MAX_LINE_LEN).await.unwrap();
            stream.write_all(b"HTTPC-USE:A\n").await.unwrap();
            let _ = read_to_end_limited(&mut stream, 1024).await;
            // Garbage instead of a rotation record.
            stream.write_all(b"\x00\x01\x02").await.unwrap();
            stream.shutdown().await.unwrap();
        });

        let client = client(secure_port, http_port, vec![Certificate::new("A", "s1")]);
        let outcome = client.request_with_outcome(b"ping").await.unwrap();

        assert!(matches!(outcome, Outcome::Fallback { reason: Error::Json(_), .. }));
        assert!(client.session_uses().is_none());
    }

    #[tokio::test]
    async fn test_plain_http_unreachable_is_an_error() {
        let client = client(closed_port().await, closed_port().await, vec![]);
        assert!(client.request(b"GET /").await.is_err());
    }
}
