//! Error types for the sieve resolver.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in sieve-srv operations.
#[derive(Error, Debug)]
pub enum SrvError {
    /// Listener failed to bind or serve.
    #[error("server error: {0}")]
    Server(String),

    /// Configuration is invalid or missing required fields.
    #[error("config error: {0}")]
    Config(String),

    /// Certificate or key could not be loaded, or the handshake failed.
    #[error("tls error: {0}")]
    Tls(String),

    /// A blocklist file could not be read.
    #[error("blocklist error: {0}")]
    Blocklist(String),

    /// Upstream exchange failed.
    #[error("upstream {server} failed: {reason}")]
    Upstream {
        /// Upstream address.
        server: String,
        /// What went wrong.
        reason: String,
    },

    /// Upstream did not answer in time.
    #[error("upstream {server} timed out after {timeout:?}")]
    Timeout {
        /// Upstream address.
        server: String,
        /// Configured bound.
        timeout: Duration,
    },

    /// DNS wire encode/decode failed.
    #[error("wire error: {0}")]
    Wire(String),

    /// Policy store error.
    #[error(transparent)]
    Policy(#[from] sieve_core::CoreError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SrvError {
    /// Build an [`SrvError::Upstream`].
    pub fn upstream(server: impl ToString, reason: impl ToString) -> Self {
        Self::Upstream {
            server: server.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error came from talking to an upstream resolver.
    #[must_use]
    pub const fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::Timeout { .. })
    }
}
