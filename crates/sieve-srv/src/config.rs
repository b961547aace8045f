//! Server configuration for sieve.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::SrvError;

/// Port used for upstream addresses given without one.
pub const DEFAULT_UPSTREAM_PORT: u16 = 53;

/// Top-level resolver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Service hostname; `.<hostname>` is stripped from SNI to get the caller ID.
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// DoH and management API listener.
    #[serde(default)]
    pub http: HttpConfig,

    /// DNS-over-TLS listener.
    #[serde(default)]
    pub dot: DotConfig,

    /// Upstream resolver pool.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Response cache bounds.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Preset store location.
    #[serde(default)]
    pub store: StoreConfig,

    /// Category blocklist files.
    #[serde(default)]
    pub categories: Vec<CategorySource>,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Listen address (default: 0.0.0.0:8080).
    #[serde(default = "default_http_listen")]
    pub listen: SocketAddr,
}

/// DoT listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DotConfig {
    /// Whether to run the DoT listener at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Listen address (default: 0.0.0.0:853).
    #[serde(default = "default_dot_listen")]
    pub listen: SocketAddr,

    /// PEM certificate chain.
    #[serde(default = "default_cert_path")]
    pub cert_path: PathBuf,

    /// PEM private key.
    #[serde(default = "default_key_path")]
    pub key_path: PathBuf,

    /// Delay before retrying a failed bind (seconds).
    #[serde(default = "default_bind_retry")]
    pub bind_retry_secs: u64,

    /// Delay before restarting a serve loop that exited (seconds).
    #[serde(default = "default_restart_delay")]
    pub restart_delay_secs: u64,

    /// Time a client gets to complete the TLS handshake (seconds).
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,
}

/// Upstream pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// `ip` or `ip:port` entries. Port 53 is assumed when absent.
    #[serde(default = "default_upstreams")]
    pub servers: Vec<String>,

    /// Per-exchange timeout (seconds).
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,
}

/// Response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL for answers without answer records (seconds).
    #[serde(default = "default_cache_ttl")]
    pub default_ttl_secs: u32,

    /// Upper bound on any cached TTL (seconds).
    #[serde(default = "default_cache_max_ttl")]
    pub max_ttl_secs: u32,

    /// Maximum number of cached answers.
    #[serde(default = "default_cache_entries")]
    pub max_entries: u64,
}

/// Preset store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON file holding the presets.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

/// A named blocklist file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySource {
    /// Category name referenced by presets.
    pub name: String,
    /// One domain per line.
    pub file: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            http: HttpConfig::default(),
            dot: DotConfig::default(),
            upstream: UpstreamConfig::default(),
            cache: CacheConfig::default(),
            store: StoreConfig::default(),
            categories: Vec::new(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: default_http_listen(),
        }
    }
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: default_dot_listen(),
            cert_path: default_cert_path(),
            key_path: default_key_path(),
            bind_retry_secs: default_bind_retry(),
            restart_delay_secs: default_restart_delay(),
            handshake_timeout_secs: default_handshake_timeout(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            servers: default_upstreams(),
            timeout_secs: default_upstream_timeout(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_cache_ttl(),
            max_ttl_secs: default_cache_max_ttl(),
            max_entries: default_cache_entries(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl ServerConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content).map_err(|e| SrvError::Config(e.to_string()))
        } else {
            Ok(Self::default())
        }
    }

    /// Check the invariants the server relies on.
    pub fn validate(&self) -> crate::Result<()> {
        if self.upstream.servers.is_empty() {
            return Err(SrvError::Config("at least one upstream server is required".into()));
        }
        if self.upstream.timeout_secs == 0 {
            return Err(SrvError::Config("upstream.timeout_secs must be positive".into()));
        }
        if self.dot.handshake_timeout_secs == 0 {
            return Err(SrvError::Config("dot.handshake_timeout_secs must be positive".into()));
        }
        self.upstream_addrs()?;

        let mut seen = HashSet::new();
        for category in &self.categories {
            if category.name.trim().is_empty() {
                return Err(SrvError::Config("category name must not be empty".into()));
            }
            if !seen.insert(category.name.as_str()) {
                return Err(SrvError::Config(format!(
                    "duplicate category '{}'",
                    category.name
                )));
            }
        }
        Ok(())
    }

    /// Parsed upstream addresses.
    pub fn upstream_addrs(&self) -> crate::Result<Vec<SocketAddr>> {
        self.upstream
            .servers
            .iter()
            .map(|server| parse_upstream(server))
            .collect()
    }

    /// Upstream exchange timeout.
    #[must_use]
    pub const fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.timeout_secs)
    }

    /// Category names in configuration order.
    pub fn category_names(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.name.clone()).collect()
    }
}

/// Parse `ip` or `ip:port` (IPv6 with port as `[::1]:53`).
pub fn parse_upstream(server: &str) -> crate::Result<SocketAddr> {
    let server = server.trim();
    if let Ok(addr) = server.parse::<SocketAddr>() {
        return Ok(addr);
    }
    server
        .parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, DEFAULT_UPSTREAM_PORT))
        .map_err(|_| SrvError::Config(format!("invalid upstream address '{server}'")))
}

// Default value functions for serde.
fn default_hostname() -> String {
    String::from("dns.localhost")
}

fn default_http_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_dot_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 853))
}

fn default_cert_path() -> PathBuf {
    PathBuf::from("certs/fullchain.pem")
}

fn default_key_path() -> PathBuf {
    PathBuf::from("certs/privkey.pem")
}

fn default_store_path() -> PathBuf {
    PathBuf::from("presets.json")
}

fn default_upstreams() -> Vec<String> {
    vec![String::from("1.1.1.1"), String::from("8.8.8.8")]
}

const fn default_true() -> bool {
    true
}

const fn default_bind_retry() -> u64 {
    5
}

const fn default_restart_delay() -> u64 {
    1
}

const fn default_handshake_timeout() -> u64 {
    10
}

const fn default_upstream_timeout() -> u64 {
    5
}

const fn default_cache_ttl() -> u32 {
    60
}

const fn default_cache_max_ttl() -> u32 {
    86400
}

const fn default_cache_entries() -> u64 {
    100_000
}
