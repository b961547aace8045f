//! Tracing subscriber setup.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `level` when set. Noisy dependency targets are
/// capped at `warn`. Logs go to stderr so command output stays clean.
pub fn init(level: &str, json: bool) -> Result<()> {
    let filter = build_filter(level)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    }
    .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}

fn build_filter(level: &str) -> Result<EnvFilter> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).map_err(|e| anyhow!("invalid log level '{level}': {e}"))?,
    };
    Ok(filter
        .add_directive("hyper=warn".parse()?)
        .add_directive("rustls=warn".parse()?))
}
