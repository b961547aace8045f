//! Round-robin upstream address pool.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use tracing::info;

/// Round-robin pool of upstream addresses.
///
/// The pool is never empty: construction requires at least one address and
/// removing the last one panics without touching the list.
#[derive(Debug)]
pub struct UpstreamSelector {
    servers: RwLock<Vec<SocketAddr>>,
    cursor: AtomicUsize,
}

impl UpstreamSelector {
    /// Create a pool.
    ///
    /// # Panics
    ///
    /// Panics if `servers` is empty.
    #[must_use]
    pub fn new(servers: Vec<SocketAddr>) -> Self {
        assert!(!servers.is_empty(), "upstream pool needs at least one server");
        Self {
            servers: RwLock::new(servers),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Next address in rotation.
    pub fn next(&self) -> SocketAddr {
        let servers = self.servers.read();
        let n = self.cursor.fetch_add(1, Ordering::Relaxed);
        servers[n % servers.len()]
    }

    /// Append an address.
    pub fn add(&self, addr: SocketAddr) {
        self.servers.write().push(addr);
        info!(upstream = %addr, "Upstream added");
    }

    /// Remove an address. Returns whether it was present.
    ///
    /// # Panics
    ///
    /// Panics if this would leave the pool empty.
    pub fn remove(&self, addr: SocketAddr) -> bool {
        let mut servers = self.servers.write();
        let Some(index) = servers.iter().position(|s| *s == addr) else {
            return false;
        };
        assert!(
            servers.len() > 1,
            "cannot remove the last upstream server {addr}"
        );
        servers.remove(index);
        info!(upstream = %addr, "Upstream removed");
        true
    }

    /// Snapshot of the pool.
    pub fn list(&self) -> Vec<SocketAddr> {
        self.servers.read().clone()
    }
}
