//! sieve-srv: filtering DNS resolver.
//!
//! Accepts queries over DNS-over-TLS and DNS-over-HTTPS, decides per query
//! whether the domain is allowed under the caller's policy, and forwards
//! allowed queries to a round-robin pool of upstream resolvers.
//!
//! # Architecture
//!
//! - [`filter`] - domain-category trie and the allow/block decision
//! - [`cache`] - TTL-bound response cache
//! - [`upstream`] - round-robin selector and UDP/TCP forwarding
//! - [`processor`] - the transport-independent query pipeline
//! - [`dot`] - TLS listener, SNI identity capture and the serve supervisor
//! - [`http`] - DoH handler and the preset management API
//!
//! # Caller identity
//!
//! Over DoT the caller ID is the TLS SNI with the configured `.<hostname>`
//! suffix removed. Over DoH it is the path segment in `/doh/{id}`.

pub mod cache;
pub mod config;
pub mod dot;
pub mod error;
pub mod filter;
pub mod http;
pub mod presets;
pub mod processor;
pub mod server;
pub mod upstream;
pub mod wire;

// Re-exports for convenience.
pub use config::ServerConfig;
pub use error::SrvError;
pub use processor::QueryProcessor;

/// Result type for sieve-srv operations.
pub type Result<T> = std::result::Result<T, SrvError>;
