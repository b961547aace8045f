//! Domain classification and the allow/block decision.

pub mod blocklist;
pub mod engine;
pub mod trie;

pub use blocklist::{load_blocklists, read_blocklist};
pub use engine::FilteringEngine;
pub use trie::DomainTrie;
