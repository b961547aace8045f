//! Upstream resolver pool and forwarding.

pub mod resolver;
pub mod selector;

pub use resolver::{Upstream, UpstreamResolver};
pub use selector::UpstreamSelector;
