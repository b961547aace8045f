//! `sieved serve` - run the resolver.

use anyhow::Result;
use tracing::info;

use super::Context;

pub async fn execute(ctx: Context) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        http = %ctx.config.http.listen,
        dot = ctx.config.dot.enabled,
        "Starting sieved"
    );
    sieve_srv::server::run(ctx.config).await?;
    Ok(())
}
