//! CLI argument parsing and command dispatch.

pub mod args;
pub mod commands;

use anyhow::{Context as _, Result};
use args::{Cli, Commands};
use clap::Parser;
use sieve_srv::ServerConfig;

use crate::logging;

/// Run the CLI application.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level, cli.json_logs)?;

    let mut config = ServerConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    cli.apply_overrides(&mut config);

    let ctx = commands::Context { config };

    match cli.command {
        Commands::Serve => commands::serve::execute(ctx).await,
        Commands::Lookup(args) => commands::lookup::execute(&ctx, &args),
        Commands::Presets(command) => commands::presets::execute(&ctx, command).await,
    }
}
