//! TTL-bound cache of upstream answers.
//!
//! Entries are keyed by `<question name>|<numeric qtype>` and expire on their
//! own TTL through a moka [`Expiry`]; expired entries read as misses without
//! any sweep.

use std::time::{Duration, Instant};

use hickory_proto::op::{Message, ResponseCode};
use moka::sync::Cache;
use moka::Expiry;
use tracing::trace;

use crate::config::CacheConfig;

#[derive(Debug, Clone)]
struct CachedResponse {
    message: Message,
    ttl: Duration,
}

struct CachedResponseExpiry;

impl Expiry<String, CachedResponse> for CachedResponseExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedResponse,
        _current_time: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedResponse,
        _current_time: Instant,
        _current_duration: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Shared response cache.
#[derive(Clone)]
pub struct ResponseCache {
    cache: Cache<String, CachedResponse>,
    default_ttl: u32,
    max_ttl: u32,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("entries", &self.cache.entry_count())
            .field("default_ttl", &self.default_ttl)
            .field("max_ttl", &self.max_ttl)
            .finish()
    }
}

impl ResponseCache {
    /// Build a cache from configuration.
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_limits(config.max_entries, config.default_ttl_secs, config.max_ttl_secs)
    }

    /// Build a cache with explicit bounds.
    #[must_use]
    pub fn with_limits(max_entries: u64, default_ttl: u32, max_ttl: u32) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(CachedResponseExpiry)
            .build();
        Self {
            cache,
            default_ttl,
            max_ttl,
        }
    }

    /// Cached answer for `key`, if present and unexpired.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Message> {
        self.cache.get(key).map(|entry| entry.message)
    }

    /// Store `answer` under `key` for `ttl_secs` seconds.
    pub fn put(&self, key: String, answer: &Message, ttl_secs: u32) {
        trace!(key = %key, ttl = ttl_secs, "Caching answer");
        self.cache.insert(
            key,
            CachedResponse {
                message: answer.clone(),
                ttl: Duration::from_secs(u64::from(ttl_secs)),
            },
        );
    }

    /// Store `answer` with the TTL derived from its records.
    ///
    /// SERVFAIL answers are not cached. Returns whether the answer was stored.
    pub fn store(&self, key: String, answer: &Message) -> bool {
        if answer.response_code() == ResponseCode::ServFail {
            return false;
        }
        self.put(key, answer, self.ttl_for(answer));
        true
    }

    /// Minimum answer TTL, or the default when there are no answers, capped
    /// at the maximum.
    #[must_use]
    pub fn ttl_for(&self, answer: &Message) -> u32 {
        min_answer_ttl(answer)
            .unwrap_or(self.default_ttl)
            .min(self.max_ttl)
    }

    /// Approximate number of live entries.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

/// Cache key for the first question of `query`.
#[must_use]
pub fn cache_key(query: &Message) -> Option<String> {
    query
        .queries()
        .first()
        .map(|q| format!("{}|{}", q.name(), u16::from(q.query_type())))
}

/// Smallest TTL across the answer section.
#[must_use]
pub fn min_answer_ttl(message: &Message) -> Option<u32> {
    message.answers().iter().map(hickory_proto::rr::Record::ttl).min()
}
