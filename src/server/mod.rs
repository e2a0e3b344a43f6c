//! Server Infrastructure Module.
//!
//! Runs two independent services:
//!
//! 1. **HTTPC listener**: handshake, temp-key issuance and enveloped
//!    request/response, one tokio task per connection
//! 2. **Plain HTTP listener**: the fallback target, answering every request
//!    with the same placeholder response
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           Server                                 │
//! │  ┌──────────────────┐  ┌──────────────────┐  ┌──────────────┐  │
//! │  │ HTTPC Listener   │  │ Certificate      │  │ Plain HTTP   │  │
//! │  │ (Port 228)       │  │ Store (refresh)  │  │ (Port 80)    │  │
//! │  └────────┬─────────┘  └────────┬─────────┘  └──────────────┘  │
//! │           │                     │                               │
//! │           ▼                     ▼                               │
//! │  ┌──────────────────────────────────────────────────────────┐  │
//! │  │                   Session Registry                        │  │
//! │  │  • RAM-only, keyed by peer address                       │  │
//! │  │  • Per-peer serialized issue / use / rotate              │  │
//! │  └──────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Per connection: `ACCEPT → HANDSHAKE → (ROTATE_RESPONSE → close) |
//! (DECODE → PROCESS → ENCODE_RESPONSE → close)`. A failed handshake sends
//! the fallback token and closes.

pub mod config;
mod metrics;
mod session;

pub use config::{ServerConfig, ServerConfigFile};
pub use metrics::{MetricsSnapshot, ServerMetrics};
pub use session::{Grant, PeerKey, PeerSession, SessionRegistry};

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use crate::certs::{CertificateStore, DirectorySource, KeySource};
use crate::error::{Error, Result};
use crate::http::{read_request_head, RequestHandler, StaticResponder, MAX_HEAD_SIZE};
use crate::protocol::{
    decode_inbound, encode_outbound, handshake, read_to_end_limited, seal_rotation, with_deadline,
    Selection,
};

/// Main server instance.
#[derive(Clone)]
pub struct Server {
    config: Arc<ServerConfig>,
    store: Arc<CertificateStore>,
    sessions: Arc<SessionRegistry>,
    handler: Arc<dyn RequestHandler>,
    metrics: Arc<ServerMetrics>,
}

impl Server {
    /// Create a new server answering with the configured placeholder body.
    pub fn new(config: ServerConfig, store: Arc<CertificateStore>) -> Result<Self> {
        config.validate().map_err(Error::config)?;
        let handler = Arc::new(StaticResponder::new(config.response_body.clone()));

        Ok(Self {
            sessions: Arc::new(SessionRegistry::new(config.max_uses)),
            config: Arc::new(config),
            store,
            handler,
            metrics: Arc::new(ServerMetrics::new()),
        })
    }

    /// Replace the request handler.
    pub fn with_handler(mut self, handler: Arc<dyn RequestHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Load certificates, bind both listeners from the configuration and serve.
    pub async fn run(&self) -> Result<()> {
        let source: Arc<dyn KeySource> = Arc::new(DirectorySource::new(&self.config.cert_dir));
        match self.store.refresh_from(source.as_ref()) {
            Ok(count) => tracing::info!("Loaded {} certificates", count),
            Err(e) => tracing::warn!("Initial certificate load failed: {}", e),
        }
        tokio::spawn(Arc::clone(&self.store).run_refresh(source, self.config.refresh_interval));

        let secure_addr = format!("{}:{}", self.config.listen_addr, self.config.secure_port);
        let http_addr = format!("{}:{}", self.config.listen_addr, self.config.http_port);
        let secure = TcpListener::bind(&secure_addr).await?;
        let plain = TcpListener::bind(&http_addr).await?;

        self.serve(secure, plain).await
    }

    /// Serve on already-bound listeners.
    pub async fn serve(&self, secure: TcpListener, plain: TcpListener) -> Result<()> {
        tracing::info!("HTTPC listening on {}", secure.local_addr()?);
        tracing::info!("Plain HTTP listening on {}", plain.local_addr()?);

        if let Some(idle) = self.config.idle_timeout {
            let sessions = Arc::clone(&self.sessions);
            tokio::spawn(async move {
                sessions.run_cleanup(idle).await;
            });
        }

        tokio::join!(self.accept_secure(secure), self.accept_plain(plain));
        Ok(())
    }

    async fn accept_secure(&self, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    let server = self.clone();

                    tokio::spawn(async move {
                        server.metrics.increment_connections();

                        if let Err(e) = server.handle_connection(stream, peer_addr).await {
                            server.metrics.increment_connection_errors();
                            tracing::debug!("Connection error from {}: {}", peer_addr, e);
                        }

                        server.metrics.decrement_connections();
                    });
                }
                Err(e) => {
                    tracing::warn!("Accept error: {}", e);
                }
            }
        }
    }

    async fn accept_plain(&self, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    let server = self.clone();

                    tokio::spawn(async move {
                        if let Err(e) = server.handle_plain(stream).await {
                            tracing::debug!("Plain HTTP error from {}: {}", peer_addr, e);
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!("Plain accept error: {}", e);
                }
            }
        }
    }

    async fn handle_connection(&self, mut stream: TcpStream, peer_addr: SocketAddr) -> Result<()> {
        stream.set_nodelay(true)?;

        let negotiated = match with_deadline(
            self.config.handshake_timeout,
            handshake::accept(&mut stream, &self.store),
        )
        .await
        {
            Ok(negotiated) => negotiated,
            Err(e) => {
                // The peer may already be gone.
                let _ = stream.write_all(Selection::Fallback.to_line().as_bytes()).await;
                let _ = stream.shutdown().await;
                return Err(e);
            }
        };

        let Some(cert) = negotiated else {
            self.metrics.increment_fallbacks();
            tracing::debug!("No shared certificate with {}, sent fallback", peer_addr);
            stream.shutdown().await?;
            return Ok(());
        };

        self.metrics.increment_secure_handshakes();
        tracing::debug!("Peer {} selected certificate {}", peer_addr, cert.id);

        let peer = peer_addr.ip();
        let grant = self.sessions.obtain(peer, &cert.seed);
        if grant.rotated {
            return self.send_rotation(&mut stream, &grant, &cert.seed).await;
        }

        let request = match with_deadline(
            self.config.io_timeout,
            read_to_end_limited(&mut stream, self.config.max_payload_size),
        )
        .await
        {
            Ok(request) => request,
            Err(e) => {
                self.sessions.release(peer, &grant.temp_key);
                return Err(e);
            }
        };

        // The client sends nothing when it expects a rotation record, which
        // happens after it has dropped its own key state.
        if request.is_empty() {
            tracing::debug!("Peer {} requested a temp key", peer_addr);
            let renewed = self.sessions.renew(peer, &cert.seed, &grant.temp_key);
            return self.send_rotation(&mut stream, &renewed, &cert.seed).await;
        }

        self.sessions.commit(peer, &grant.temp_key);
        self.metrics.add_bytes_received(request.len() as u64);

        let plaintext = decode_inbound(&request, &cert.seed, &grant.temp_key);
        let response = self.handler.handle(&plaintext);
        let sealed = encode_outbound(&response, &grant.temp_key, &cert.seed);

        stream.write_all(&sealed).await?;
        self.metrics.add_bytes_sent(sealed.len() as u64);
        self.metrics.increment_requests_served();

        stream.shutdown().await?;
        Ok(())
    }

    /// Send `grant` as a rotation record and close.
    ///
    /// Only freshly issued keys count as rotations.
    async fn send_rotation(&self, stream: &mut TcpStream, grant: &Grant, seed: &str) -> Result<()> {
        let record = seal_rotation(&grant.temp_key, seed)?;
        stream.write_all(&record).await?;
        if grant.rotated {
            self.metrics.increment_rotations();
        }
        self.metrics.add_bytes_sent(record.len() as u64);

        stream.shutdown().await?;
        Ok(())
    }

    async fn handle_plain(&self, mut stream: TcpStream) -> Result<()> {
        let head = with_deadline(
            self.config.io_timeout,
            read_request_head(&mut stream, MAX_HEAD_SIZE),
        )
        .await?;

        let response = self.handler.handle(&head);
        stream.write_all(&response).await?;
        self.metrics.increment_plain_requests();

        stream.shutdown().await?;
        Ok(())
    }

    /// Get server metrics.
    pub fn metrics(&self) -> &ServerMetrics {
        &self.metrics
    }

    /// Get the session registry.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Get session count.
    pub fn session_count(&self) -> usize {
        self.sessions.count()
    }
}
