//! `sieved lookup` - classify a domain against the configured blocklists.

use anyhow::Result;
use sieve_srv::filter::load_blocklists;

use super::Context;
use crate::cli::args::LookupArgs;

pub fn execute(ctx: &Context, args: &LookupArgs) -> Result<()> {
    let trie = load_blocklists(&ctx.config.categories)?;
    match trie.lookup(&args.domain) {
        Some(category) => println!("{}: {category}", args.domain),
        None => println!("{}: not listed", args.domain),
    }
    Ok(())
}
