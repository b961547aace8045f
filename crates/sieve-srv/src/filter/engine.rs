//! Per-query allow/block decision.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sieve_core::{Category, DomainRepository, PolicyStore};
use tracing::trace;

/// Decides whether a caller may resolve a domain.
#[derive(Clone)]
pub struct FilteringEngine {
    domains: Arc<dyn DomainRepository>,
    store: Arc<dyn PolicyStore>,
}

impl std::fmt::Debug for FilteringEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilteringEngine").finish_non_exhaustive()
    }
}

impl FilteringEngine {
    /// Create an engine over a domain repository and a policy store.
    pub fn new(domains: Arc<dyn DomainRepository>, store: Arc<dyn PolicyStore>) -> Self {
        Self { domains, store }
    }

    /// Whether `domain` is blocked for `caller_id` right now.
    pub async fn decide(&self, caller_id: &str, domain: &str) -> crate::Result<bool> {
        self.decide_at(caller_id, domain, Utc::now()).await
    }

    /// Whether `domain` is blocked for `caller_id` at `now`.
    ///
    /// A missing policy is an error; callers fail closed on it.
    pub async fn decide_at(
        &self,
        caller_id: &str,
        domain: &str,
        now: DateTime<Utc>,
    ) -> crate::Result<bool> {
        let domain = domain.strip_suffix('.').unwrap_or(domain);
        let settings = self.store.get_config(caller_id).await?;

        if !settings.enabled {
            return Ok(false);
        }

        let Some(category_name) = self.domains.domain_category(domain) else {
            return Ok(false);
        };

        let blocked = match settings.category(category_name) {
            Some(Category::Blocked) => true,
            Some(Category::Scheduled) => !settings.within_schedule(now),
            Some(Category::Neutral) | None => false,
        };

        trace!(
            caller = caller_id,
            domain,
            category = category_name,
            blocked,
            "Filter decision"
        );
        Ok(blocked)
    }
}
