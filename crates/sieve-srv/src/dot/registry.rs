//! Peer address to caller ID map for live DoT connections.

use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::trace;

/// Live TLS connections, keyed by peer address, mapped to caller IDs.
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    entries: DashMap<SocketAddr, String>,
}

impl IdentityRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `caller_id` for `peer`. The entry lives as long as the guard.
    #[must_use = "the registry entry is removed when the guard is dropped"]
    pub fn register(self: &Arc<Self>, peer: SocketAddr, caller_id: String) -> RegistryGuard {
        trace!(peer = %peer, caller = %caller_id, "Connection registered");
        self.entries.insert(peer, caller_id);
        RegistryGuard {
            registry: Arc::clone(self),
            peer,
        }
    }

    /// Caller ID for a connected peer.
    #[must_use]
    pub fn lookup(&self, peer: &SocketAddr) -> Option<String> {
        self.entries.get(peer).map(|entry| entry.value().clone())
    }

    /// Number of registered connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no connection is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Removes a peer's registry entry on drop.
#[derive(Debug)]
pub struct RegistryGuard {
    registry: Arc<IdentityRegistry>,
    peer: SocketAddr,
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        self.registry.entries.remove(&self.peer);
        trace!(peer = %self.peer, "Connection unregistered");
    }
}

/// Caller ID from an SNI value: the name minus a trailing `.<hostname>`.
///
/// Names outside the hostname are used whole.
#[must_use]
pub fn caller_id_from_sni(sni: &str, hostname: &str) -> String {
    let sni = sni.to_ascii_lowercase();
    let hostname = hostname.trim_end_matches('.').to_ascii_lowercase();
    if hostname.is_empty() {
        return sni;
    }
    sni.strip_suffix(&hostname)
        .and_then(|rest| rest.strip_suffix('.'))
        .map_or_else(|| sni.clone(), str::to_string)
}
