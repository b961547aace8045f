//! DNS-over-TLS transport.
//!
//! [`IdentityListener`] owns the TCP listener, the TLS acceptor and the
//! [`IdentityRegistry`]. Each accepted connection is handshaken, its SNI is
//! recorded against the peer address, and the record is dropped with the
//! connection. [`DotServer`] supervises the listener and restarts it on
//! failure.

pub mod listener;
pub mod registry;
pub mod server;
pub mod tls;

pub use listener::{Handshake, IdentityListener, TrackedStream};
pub use registry::{caller_id_from_sni, IdentityRegistry, RegistryGuard};
pub use server::{serve_connection, DotServer};
pub use tls::load_acceptor;
