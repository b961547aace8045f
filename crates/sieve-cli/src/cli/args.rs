//! Command-line argument definitions using clap.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use sieve_srv::ServerConfig;

/// Filtering DNS resolver
///
/// Answers DNS-over-TLS and DNS-over-HTTPS queries, blocking domains per
/// caller according to category blocklists and weekly schedules.
#[derive(Parser, Debug)]
#[command(name = "sieved")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (TOML). Defaults apply when it does not exist.
    #[arg(short, long, env = "SIEVE_CONFIG", default_value = "sieve.toml", global = true)]
    pub config: PathBuf,

    /// Log level or filter directive (RUST_LOG takes precedence)
    #[arg(long, env = "SIEVE_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Service hostname stripped from SNI
    #[arg(long, env = "SIEVE_HOSTNAME", global = true)]
    pub hostname: Option<String>,

    /// Do not start the DoT listener
    #[arg(long, env = "SIEVE_DOT_DISABLED", global = true)]
    pub no_dot: bool,

    /// HTTP (DoH + management API) listen address
    #[arg(long, env = "SIEVE_HTTP_LISTEN", global = true)]
    pub http_listen: Option<SocketAddr>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the resolver
    Serve,

    /// Show the blocklist category of a domain
    Lookup(LookupArgs),

    /// Inspect stored presets
    #[command(subcommand)]
    Presets(PresetsCommand),
}

#[derive(Args, Debug)]
pub struct LookupArgs {
    /// Domain to classify (e.g., ads.example.com)
    pub domain: String,
}

#[derive(Subcommand, Debug)]
pub enum PresetsCommand {
    /// List every preset
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show one preset as JSON
    Show {
        /// Preset ID
        id: String,
    },
}

impl Cli {
    /// Apply command-line and environment overrides on top of the file.
    pub fn apply_overrides(&self, config: &mut ServerConfig) {
        if let Some(hostname) = &self.hostname {
            config.hostname.clone_from(hostname);
        }
        if self.no_dot {
            config.dot.enabled = false;
        }
        if let Some(listen) = self.http_listen {
            config.http.listen = listen;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lookup_with_globals() {
        let cli = Cli::try_parse_from([
            "sieved",
            "lookup",
            "ads.example.com",
            "--config",
            "/etc/sieve.toml",
            "--json-logs",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("/etc/sieve.toml"));
        assert!(cli.json_logs);
        match cli.command {
            Commands::Lookup(args) => assert_eq!(args.domain, "ads.example.com"),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_presets_show() {
        let cli = Cli::try_parse_from(["sieved", "presets", "show", "abc1234"]).unwrap();
        assert!(matches!(cli.command, Commands::Presets(PresetsCommand::Show { ref id }) if id == "abc1234"));
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let cli = Cli::try_parse_from([
            "sieved",
            "--hostname",
            "dns.example.net",
            "--no-dot",
            "--http-listen",
            "127.0.0.1:9090",
            "serve",
        ])
        .unwrap();

        let mut config = ServerConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.hostname, "dns.example.net");
        assert!(!config.dot.enabled);
        assert_eq!(config.http.listen.port(), 9090);
    }

    #[test]
    fn test_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["sieved"]).is_err());
    }
}
