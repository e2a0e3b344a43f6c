//! Certificate store.
//!
//! Holds the current `id → seed` mapping. The mapping is replaced wholesale on
//! refresh by swapping an `Arc`, so a reader holding a [`CertificateStore::snapshot`]
//! never observes a partially updated set.

mod source;

pub use source::{DirectorySource, KeySource, StaticSource, CERT_EXTENSION};

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A pre-shared `(id, seed)` pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// Identifier exchanged in the clear during the handshake
    pub id: String,
    /// Secret seed keying the outer cipher layer
    pub seed: String,
}

impl Certificate {
    /// Create a certificate.
    pub fn new(id: impl Into<String>, seed: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            seed: seed.into(),
        }
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("id", &self.id)
            .field("seed", &"<redacted>")
            .finish()
    }
}

/// Immutable view of the mapping at one point in time.
pub type CertificateMap = HashMap<String, Certificate>;

/// Thread-safe, copy-on-refresh certificate mapping.
pub struct CertificateStore {
    certs: RwLock<Arc<CertificateMap>>,
}

impl CertificateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            certs: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    /// Create a store pre-populated with `certs`.
    pub fn from_certificates(certs: impl IntoIterator<Item = Certificate>) -> Self {
        let store = Self::new();
        store.replace(certs);
        store
    }

    /// Every certificate id currently known, sorted.
    pub fn identifiers(&self) -> BTreeSet<String> {
        self.snapshot().keys().cloned().collect()
    }

    /// Seed for `id`.
    pub fn seed_for(&self, id: &str) -> Result<String> {
        self.snapshot()
            .get(id)
            .map(|c| c.seed.clone())
            .ok_or_else(|| Error::CertificateNotFound(id.to_string()))
    }

    /// Current mapping. Later refreshes do not affect the returned value.
    pub fn snapshot(&self) -> Arc<CertificateMap> {
        Arc::clone(&*self.certs.read())
    }

    /// Number of certificates.
    pub fn len(&self) -> usize {
        self.certs.read().len()
    }

    /// Whether the store holds no certificates.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the whole mapping. Returns the new certificate count.
    ///
    /// When ids repeat, the last entry wins.
    pub fn replace(&self, certs: impl IntoIterator<Item = Certificate>) -> usize {
        let mut map = HashMap::new();
        for cert in certs {
            if let Some(prev) = map.insert(cert.id.clone(), cert) {
                tracing::warn!("Duplicate certificate id {}, keeping last", prev.id);
            }
        }
        let count = map.len();
        *self.certs.write() = Arc::new(map);
        count
    }

    /// Pull fresh records from `source` and swap them in.
    ///
    /// On error the previous mapping stays in place.
    pub fn refresh_from(&self, source: &dyn KeySource) -> Result<usize> {
        let certs = source.fetch()?;
        Ok(self.replace(certs))
    }

    /// Refresh from `source` every `interval`, forever.
    ///
    /// The first refresh happens one `interval` after the call; callers load
    /// the initial set themselves.
    pub async fn run_refresh(self: Arc<Self>, source: Arc<dyn KeySource>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;

            let src = Arc::clone(&source);
            let fetched = tokio::task::spawn_blocking(move || src.fetch()).await;

            match fetched {
                Ok(Ok(certs)) => {
                    let count = self.replace(certs);
                    tracing::debug!("Refreshed key material: {} certificates", count);
                }
                Ok(Err(e)) => {
                    tracing::warn!("Key material refresh failed: {}", e);
                }
                Err(e) => {
                    tracing::warn!("Key material refresh task failed: {}", e);
                }
            }
        }
    }
}

impl Default for CertificateStore {
    fn default() -> Self {
        Self::new()
    }
}
