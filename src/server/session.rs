//! Per-peer temp-key registry.
//!
//! All session data lives only in RAM. Each peer address owns at most one
//! [`PeerSession`]; every read-modify-write on it happens under that entry's
//! shard lock, so concurrent connections from one peer are serialized.
//!
//! A request round reserves a use in [`SessionRegistry::obtain`] and then
//! either [`commit`](SessionRegistry::commit)s it once the body arrived or
//! [`release`](SessionRegistry::release)s it when the body never did.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use zeroize::ZeroizeOnDrop;

use crate::crypto::generate_temp_key;

/// Sessions are keyed by the peer's IP address.
///
/// Clients reconnect from fresh ephemeral ports, so the port is dropped.
/// Distinct clients behind one address share a session.
pub type PeerKey = IpAddr;

/// Temp-key state for one peer.
///
/// The temp key and seed are zeroized on drop.
#[derive(Clone, ZeroizeOnDrop)]
pub struct PeerSession {
    #[zeroize(skip)]
    peer_key: PeerKey,
    temp_key: String,
    #[zeroize(skip)]
    uses: u32,
    #[zeroize(skip)]
    served: u32,
    /// Seed of the certificate negotiated when the key was issued
    pub_seed: String,
    #[zeroize(skip)]
    created_at: Instant,
    #[zeroize(skip)]
    last_used: Instant,
}

impl PeerSession {
    fn issue(peer_key: PeerKey, pub_seed: &str) -> Self {
        let now = Instant::now();
        Self {
            peer_key,
            temp_key: generate_temp_key(&peer_key.to_string()),
            uses: 0,
            served: 0,
            pub_seed: pub_seed.to_string(),
            created_at: now,
            last_used: now,
        }
    }

    /// Peer this session belongs to.
    pub fn peer_key(&self) -> PeerKey {
        self.peer_key
    }

    /// Current temp key.
    pub fn temp_key(&self) -> &str {
        &self.temp_key
    }

    /// Requests admitted under the current temp key, in flight included.
    pub fn uses(&self) -> u32 {
        self.uses
    }

    /// Requests whose body has been received under the current temp key.
    pub fn served(&self) -> u32 {
        self.served
    }

    /// Seed recorded at issuance.
    pub fn pub_seed(&self) -> &str {
        &self.pub_seed
    }

    /// When the current temp key was issued.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Check if the session has been idle longer than `timeout`.
    pub fn is_idle(&self, timeout: Duration) -> bool {
        self.last_used.elapsed() > timeout
    }
}

/// Result of [`SessionRegistry::obtain`].
#[derive(Clone, PartialEq, Eq)]
pub struct Grant {
    /// Temp key to use for this round
    pub temp_key: String,
    /// True when the key was issued by this call
    pub rotated: bool,
}

impl std::fmt::Debug for Grant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grant")
            .field("temp_key", &"<redacted>")
            .field("rotated", &self.rotated)
            .finish()
    }
}

/// Server-owned table of peer sessions.
pub struct SessionRegistry {
    sessions: DashMap<PeerKey, PeerSession>,
    max_uses: u32,
}

impl SessionRegistry {
    /// Create a registry that rotates after `max_uses` requests per key.
    pub fn new(max_uses: u32) -> Self {
        Self {
            sessions: DashMap::new(),
            max_uses,
        }
    }

    /// Configured use budget per temp key.
    pub fn max_uses(&self) -> u32 {
        self.max_uses
    }

    /// Issue or reuse the temp key for `peer`.
    ///
    /// A new key is issued with `uses = 0` when the peer has none or has
    /// spent `max_uses` requests on the current one; the issuance round
    /// itself consumes nothing. Otherwise `uses` is incremented.
    pub fn obtain(&self, peer: PeerKey, pub_seed: &str) -> Grant {
        match self.sessions.entry(peer) {
            Entry::Occupied(mut entry) => {
                let session = entry.get_mut();
                if session.uses >= self.max_uses {
                    *session = PeerSession::issue(peer, pub_seed);
                    Grant {
                        temp_key: session.temp_key.clone(),
                        rotated: true,
                    }
                } else {
                    session.uses += 1;
                    session.last_used = Instant::now();
                    Grant {
                        temp_key: session.temp_key.clone(),
                        rotated: false,
                    }
                }
            }
            Entry::Vacant(entry) => {
                let session = entry.insert(PeerSession::issue(peer, pub_seed));
                Grant {
                    temp_key: session.temp_key.clone(),
                    rotated: true,
                }
            }
        }
    }

    /// Record that the request admitted under `temp_key` arrived.
    ///
    /// Does nothing if the key has been replaced meanwhile.
    pub fn commit(&self, peer: PeerKey, temp_key: &str) {
        if let Some(mut session) = self.sessions.get_mut(&peer) {
            if session.temp_key == temp_key {
                session.served += 1;
                session.last_used = Instant::now();
            }
        }
    }

    /// Give back the use reserved for a request that never arrived.
    pub fn release(&self, peer: PeerKey, temp_key: &str) {
        if let Some(mut session) = self.sessions.get_mut(&peer) {
            if session.temp_key == temp_key && session.uses > session.served {
                session.uses -= 1;
            }
        }
    }

    /// Answer an empty request that was admitted under `granted`.
    ///
    /// The reserved use is given back. A new key is issued only while
    /// `granted` is still current and has carried a request; otherwise the
    /// current key is handed out again. Concurrent empty requests for one
    /// key therefore share a single new key.
    pub fn renew(&self, peer: PeerKey, pub_seed: &str, granted: &str) -> Grant {
        match self.sessions.entry(peer) {
            Entry::Occupied(mut entry) => {
                let session = entry.get_mut();
                if session.temp_key == granted {
                    if session.uses > session.served {
                        session.uses -= 1;
                    }
                    if session.served > 0 {
                        *session = PeerSession::issue(peer, pub_seed);
                        return Grant {
                            temp_key: session.temp_key.clone(),
                            rotated: true,
                        };
                    }
                }
                Grant {
                    temp_key: session.temp_key.clone(),
                    rotated: false,
                }
            }
            Entry::Vacant(entry) => {
                let session = entry.insert(PeerSession::issue(peer, pub_seed));
                Grant {
                    temp_key: session.temp_key.clone(),
                    rotated: true,
                }
            }
        }
    }

    /// Copy of the session for `peer`.
    pub fn get(&self, peer: &PeerKey) -> Option<PeerSession> {
        self.sessions.get(peer).map(|s| s.value().clone())
    }

    /// Drop the session for `peer`.
    pub fn remove(&self, peer: &PeerKey) {
        self.sessions.remove(peer);
    }

    /// Get session count.
    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Drop every session idle for longer than `timeout`. Returns how many.
    pub fn evict_idle(&self, timeout: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_idle(timeout));
        before.saturating_sub(self.sessions.len())
    }

    /// Run periodic eviction of idle sessions.
    pub async fn run_cleanup(&self, timeout: Duration) {
        let period = (timeout / 2).max(Duration::from_secs(1));
        loop {
            tokio::time::sleep(period).await;

            let evicted = self.evict_idle(timeout);
            if evicted > 0 {
                tracing::debug!("Evicted {} idle sessions", evicted);
            }
        }
    }
}
