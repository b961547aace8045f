//! Reverse-label prefix tree mapping domains to category names.
//!
//! `ads.example.com` is stored as `com -> example -> ads`. A literal `*`
//! label matches any subdomain below its parent, so `*.example.com` covers
//! `a.example.com` and `a.b.example.com` but not `example.com` itself.

use std::collections::HashMap;

use sieve_core::DomainRepository;

const WILDCARD: &str = "*";

#[derive(Debug, Default)]
struct TrieNode {
    children: HashMap<String, TrieNode>,
    /// Set on terminal nodes.
    category: Option<String>,
}

/// Domain-to-category lookup table.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Debug, Default)]
pub struct DomainTrie {
    root: TrieNode,
    len: usize,
}

impl DomainTrie {
    /// Create an empty trie.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct domains inserted.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been inserted.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert `domain` under `category`. Re-inserting replaces the category.
    pub fn insert(&mut self, domain: &str, category: &str) {
        let domain = normalize(domain);
        if domain.is_empty() {
            return;
        }

        let mut node = &mut self.root;
        for label in domain.rsplit('.') {
            node = node.children.entry(label.to_string()).or_default();
        }
        if node.category.replace(category.to_string()).is_none() {
            self.len += 1;
        }
    }

    /// Category for `domain`.
    ///
    /// Walks from the TLD down. Every terminal node passed, and every
    /// terminal `*` child seen while labels remain, becomes the best match;
    /// the deepest one wins. A missing label ends the walk.
    #[must_use]
    pub fn lookup(&self, domain: &str) -> Option<&str> {
        let domain = normalize(domain);
        if domain.is_empty() {
            return None;
        }

        let mut node = &self.root;
        let mut best = None;
        for label in domain.rsplit('.') {
            if let Some(category) = node
                .children
                .get(WILDCARD)
                .and_then(|wildcard| wildcard.category.as_deref())
            {
                best = Some(category);
            }

            match node.children.get(label) {
                Some(child) => {
                    node = child;
                    if let Some(category) = child.category.as_deref() {
                        best = Some(category);
                    }
                }
                None => break,
            }
        }
        best
    }
}

impl DomainRepository for DomainTrie {
    fn domain_category(&self, domain: &str) -> Option<&str> {
        self.lookup(domain)
    }

    fn add_domain(&mut self, domain: &str, category: &str) {
        self.insert(domain, category);
    }
}

/// Trim, drop one trailing dot, lowercase.
fn normalize(domain: &str) -> String {
    let domain = domain.trim();
    domain
        .strip_suffix('.')
        .unwrap_or(domain)
        .to_ascii_lowercase()
}
