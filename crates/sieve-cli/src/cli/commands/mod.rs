//! Command implementations.

pub mod lookup;
pub mod presets;
pub mod serve;

use sieve_srv::ServerConfig;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Effective configuration (file plus overrides).
    pub config: ServerConfig,
}
