//! Storage contracts and implementations.
//!
//! The resolver reads caller [`Settings`] through [`PolicyStore`] on every
//! query, and looks domains up through [`DomainRepository`]. Both are traits
//! so the server can be wired against in-memory fakes in tests.

mod json;
mod memory;

pub use json::JsonPolicyStore;
pub use memory::MemoryPolicyStore;

use async_trait::async_trait;

use crate::{Result, Settings};

/// Durable store of per-caller settings.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Load the settings for `id`.
    ///
    /// Returns [`CoreError::NotFound`](crate::CoreError::NotFound) if nothing
    /// is stored under that ID.
    async fn get_config(&self, id: &str) -> Result<Settings>;

    /// Insert or replace settings, keyed by `settings.id`.
    async fn update_config(&self, settings: &Settings) -> Result<()>;

    /// Remove the settings for `id`. Removing a missing ID is not an error.
    async fn delete_config(&self, id: &str) -> Result<()>;

    /// All stored settings, in no particular order.
    async fn get_all_configs(&self) -> Result<Vec<Settings>>;

    /// Whether anything is stored under `id`.
    async fn contains(&self, id: &str) -> Result<bool> {
        match self.get_config(id).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Domain to category-name lookup, populated once at startup.
pub trait DomainRepository: Send + Sync {
    /// Category name for a domain, if it or a covering wildcard is listed.
    fn domain_category(&self, domain: &str) -> Option<&str>;

    /// Register a domain under a category name.
    fn add_domain(&mut self, domain: &str, category: &str);
}
