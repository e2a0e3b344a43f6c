//! Server metrics collection.
//!
//! Aggregate counters only; nothing here identifies a peer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Server metrics collector.
pub struct ServerMetrics {
    /// Server start time
    start_time: Instant,
    /// Total connections accepted on the secure listener
    total_connections: AtomicU64,
    /// Current active secure connections
    active_connections: AtomicU64,
    /// Handshakes that selected a shared certificate
    secure_handshakes: AtomicU64,
    /// Handshakes answered with the fallback token
    fallbacks: AtomicU64,
    /// Temp keys issued
    rotations: AtomicU64,
    /// Requests decoded, processed and answered
    requests_served: AtomicU64,
    /// Requests answered by the plain HTTP listener
    plain_requests: AtomicU64,
    /// Total payload bytes sent
    bytes_sent: AtomicU64,
    /// Total payload bytes received
    bytes_received: AtomicU64,
    /// Connections that ended in an error
    connection_errors: AtomicU64,
}

impl ServerMetrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            secure_handshakes: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
            rotations: AtomicU64::new(0),
            requests_served: AtomicU64::new(0),
            plain_requests: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
        }
    }

    /// Increment total and active connections.
    pub fn increment_connections(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement active connections.
    pub fn decrement_connections(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    /// Increment successful handshake count.
    pub fn increment_secure_handshakes(&self) {
        self.secure_handshakes.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment fallback count.
    pub fn increment_fallbacks(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment temp-key issuance count.
    pub fn increment_rotations(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment served request count.
    pub fn increment_requests_served(&self) {
        self.requests_served.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment plain HTTP request count.
    pub fn increment_plain_requests(&self) {
        self.plain_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Add bytes to sent counter.
    pub fn add_bytes_sent(&self, bytes: u64) {
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Add bytes to received counter.
    pub fn add_bytes_received(&self, bytes: u64) {
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Increment connection error count.
    pub fn increment_connection_errors(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Get total connections.
    pub fn total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    /// Get active connections.
    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Get successful handshakes.
    pub fn secure_handshakes(&self) -> u64 {
        self.secure_handshakes.load(Ordering::Relaxed)
    }

    /// Get fallback count.
    pub fn fallbacks(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    /// Get rotation count.
    pub fn rotations(&self) -> u64 {
        self.rotations.load(Ordering::Relaxed)
    }

    /// Get served request count.
    pub fn requests_served(&self) -> u64 {
        self.requests_served.load(Ordering::Relaxed)
    }

    /// Get plain HTTP request count.
    pub fn plain_requests(&self) -> u64 {
        self.plain_requests.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            total_connections: self.total_connections(),
            active_connections: self.active_connections(),
            secure_handshakes: self.secure_handshakes(),
            fallbacks: self.fallbacks(),
            rotations: self.rotations(),
            requests_served: self.requests_served(),
            plain_requests: self.plain_requests(),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
        }
    }

    /// Format metrics as a simple text report.
    pub fn format_report(&self) -> String {
        let snapshot = self.snapshot();

        format!(
            r#"HTTPC Server Metrics
====================
Uptime: {} seconds

Connections:
  Total:     {}
  Active:    {}
  Secure:    {}
  Fallback:  {}
  Plain:     {}

Sessions:
  Rotations: {}
  Served:    {}

Traffic:
  Sent:     {} bytes
  Received: {} bytes

Errors:
  Connection Errors: {}
"#,
            snapshot.uptime_secs,
            snapshot.total_connections,
            snapshot.active_connections,
            snapshot.secure_handshakes,
            snapshot.fallbacks,
            snapshot.plain_requests,
            snapshot.rotations,
            snapshot.requests_served,
            snapshot.bytes_sent,
            snapshot.bytes_received,
            snapshot.connection_errors,
        )
    }
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of all metrics at a point in time.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Seconds since the collector was created
    pub uptime_secs: u64,
    /// Connections accepted on the secure listener
    pub total_connections: u64,
    /// Secure connections still open
    pub active_connections: u64,
    /// Handshakes that selected a certificate
    pub secure_handshakes: u64,
    /// Handshakes answered with the fallback token
    pub fallbacks: u64,
    /// Temp keys issued
    pub rotations: u64,
    /// Enveloped requests answered
    pub requests_served: u64,
    /// Plain HTTP requests answered
    pub plain_requests: u64,
    /// Payload bytes written
    pub bytes_sent: u64,
    /// Payload bytes read
    pub bytes_received: u64,
    /// Connections that ended in an error
    pub connection_errors: u64,
}

impl MetricsSnapshot {
    /// Share of secure-listener connections that negotiated a certificate.
    pub fn secure_rate(&self) -> f64 {
        if self.total_connections == 0 {
            0.0
        } else {
            self.secure_handshakes as f64 / self.total_connections as f64
        }
    }

    /// Share of secure-listener connections told to fall back.
    pub fn fallback_rate(&self) -> f64 {
        if self.total_connections == 0 {
            0.0
        } else {
            self.fallbacks as f64 / self.total_connections as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = ServerMetrics::new();
        assert_eq!(metrics.total_connections(), 0);
        assert_eq!(metrics.active_connections(), 0);
    }

    #[test]
    fn test_connection_counting() {
        let metrics = ServerMetrics::new();

        metrics.increment_connections();
        metrics.increment_connections();
        assert_eq!(metrics.total_connections(), 2);
        assert_eq!(metrics.active_connections(), 2);

        metrics.decrement_connections();
        assert_eq!(metrics.total_connections(), 2);
        assert_eq!(metrics.active_connections(), 1);
    }

    #[test]
    fn test_snapshot() {
        let metrics = ServerMetrics::new();

        metrics.increment_connections();
        metrics.increment_secure_handshakes();
        metrics.increment_rotations();
        metrics.add_bytes_sent(100);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_connections, 1);
        assert_eq!(snapshot.secure_handshakes, 1);
        assert_eq!(snapshot.rotations, 1);
        assert_eq!(snapshot.bytes_sent, 100);
    }

    #[test]
    fn test_snapshot_rates() {
        let snapshot = MetricsSnapshot {
            total_connections: 200,
            secure_handshakes: 150,
            fallbacks: 50,
            ..Default::default()
        };

        assert!((snapshot.secure_rate() - 0.75).abs() < 0.01);
        assert!((snapshot.fallback_rate() - 0.25).abs() < 0.01);
        assert_eq!(MetricsSnapshot::default().secure_rate(), 0.0);
    }

    #[test]
    fn test_format_report() {
        let metrics = ServerMetrics::new();
        metrics.increment_connections();
        metrics.increment_fallbacks();

        let report = metrics.format_report();
        assert!(report.contains("HTTPC Server Metrics"));
        assert!(report.contains("Total:     1"));
        assert!(report.contains("Fallback:  1"));
    }
}
