//! Blocklist file loading.
//!
//! One domain per line. Blank lines and lines starting with `#` are skipped,
//! surrounding whitespace is trimmed.

use std::fs::File;
use std::io::{BufRead, BufReader};

use sieve_core::DomainRepository;
use tracing::{debug, info};

use crate::config::CategorySource;
use crate::filter::DomainTrie;
use crate::SrvError;

/// Build a trie from every configured category file.
///
/// Any unreadable file fails the whole load.
pub fn load_blocklists(sources: &[CategorySource]) -> crate::Result<DomainTrie> {
    let mut trie = DomainTrie::new();
    for source in sources {
        let file = File::open(&source.file).map_err(|e| {
            SrvError::Blocklist(format!(
                "cannot open '{}' for category '{}': {e}",
                source.file.display(),
                source.name
            ))
        })?;
        let added = read_blocklist(BufReader::new(file), &source.name, &mut trie)
            .map_err(|e| {
                SrvError::Blocklist(format!("cannot read '{}': {e}", source.file.display()))
            })?;
        debug!(category = %source.name, domains = added, "Loaded blocklist");
    }
    info!(
        categories = sources.len(),
        domains = trie.len(),
        "Domain blocklists loaded"
    );
    Ok(trie)
}

/// Add every domain listed in `reader` to `repo` under `category`.
///
/// Returns the number of lines taken as domains.
pub fn read_blocklist<R, D>(reader: R, category: &str, repo: &mut D) -> std::io::Result<usize>
where
    R: BufRead,
    D: DomainRepository + ?Sized,
{
    let mut added = 0;
    for line in reader.lines() {
        let line = line?;
        let domain = line.trim();
        if domain.is_empty() || domain.starts_with('#') {
            continue;
        }
        repo.add_domain(domain, category);
        added += 1;
    }
    Ok(added)
}
