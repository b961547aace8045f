//! # sieve-cli
//!
//! Command-line runner for the sieve resolver.
//!
//! ## Commands
//!
//! - **serve**: run the DoT and DoH listeners plus the management API
//! - **lookup**: show which blocklist category a domain falls under
//! - **presets**: inspect the preset store

pub mod cli;
pub mod logging;

pub use cli::run;
