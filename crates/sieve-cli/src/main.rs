//! sieved - filtering DNS resolver
//!
//! Serves DNS-over-TLS and DNS-over-HTTPS with per-caller filtering.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    sieve_cli::run().await
}
