//! Core types and contracts for the sieve filtering resolver.
//!
//! This crate holds everything the resolver shares with the outside world:
//!
//! - **Types**: per-caller policy [`Settings`], the closed [`Category`] variant
//!   and the weekly [`Schedule`], plus the preset DTOs used by the management API
//! - **Contracts**: [`PolicyStore`] and [`DomainRepository`]
//! - **Stores**: in-memory and JSON-file-backed [`PolicyStore`] implementations
//! - **Errors**: [`CoreError`]
//!
//! # Example
//!
//! ```rust,ignore
//! use sieve_core::{Category, MemoryPolicyStore, PolicyStore, Settings};
//!
//! async fn seed(store: &MemoryPolicyStore) -> sieve_core::Result<()> {
//!     let mut settings = Settings::new("abc1234", "kids");
//!     settings.categories.insert("ads".into(), Category::Blocked);
//!     store.update_config(&settings).await
//! }
//! ```

mod error;
pub mod store;
pub mod types;

pub use error::{CoreError, Result};
pub use store::{DomainRepository, JsonPolicyStore, MemoryPolicyStore, PolicyStore};
pub use types::*;
