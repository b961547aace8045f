//! Transport-independent query pipeline.
//!
//! filter -> cache -> upstream -> cache write. Blocked domains, unknown
//! callers and policy errors all get an NXDOMAIN answer rather than a
//! transport failure.

use std::sync::Arc;

use hickory_proto::op::{Message, MessageType, ResponseCode};
use tracing::{debug, warn};

use crate::cache::{cache_key, ResponseCache};
use crate::filter::FilteringEngine;
use crate::upstream::Upstream;

/// Runs a decoded query through filtering, caching and forwarding.
#[derive(Clone)]
pub struct QueryProcessor {
    engine: FilteringEngine,
    cache: ResponseCache,
    upstream: Arc<dyn Upstream>,
}

impl std::fmt::Debug for QueryProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryProcessor")
            .field("engine", &self.engine)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl QueryProcessor {
    /// Wire the pipeline together.
    pub fn new(engine: FilteringEngine, cache: ResponseCache, upstream: Arc<dyn Upstream>) -> Self {
        Self {
            engine,
            cache,
            upstream,
        }
    }

    /// The response cache.
    #[must_use]
    pub const fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Answer `query` on behalf of `caller_id`.
    ///
    /// Only upstream failures are returned as errors.
    pub async fn process(&self, caller_id: &str, query: &Message) -> crate::Result<Message> {
        let (Some(question), Some(key)) = (query.queries().first(), cache_key(query)) else {
            debug!(caller = caller_id, id = query.id(), "Query without question");
            return Ok(format_error(query));
        };

        let domain = question.name().to_ascii();
        match self.engine.decide(caller_id, &domain).await {
            Ok(false) => {}
            Ok(true) => {
                debug!(caller = caller_id, domain = %domain, "Blocked");
                return Ok(name_error(query));
            }
            Err(e) => {
                warn!(caller = caller_id, domain = %domain, error = %e, "Policy lookup failed, refusing query");
                return Ok(name_error(query));
            }
        }

        if let Some(mut cached) = self.cache.get(&key) {
            debug!(caller = caller_id, key = %key, "Cache hit");
            cached.set_id(query.id());
            return Ok(cached);
        }

        let answer = self.upstream.resolve(query).await?;
        self.cache.store(key, &answer);
        Ok(answer)
    }
}

/// NXDOMAIN answer echoing `query`.
#[must_use]
pub fn name_error(query: &Message) -> Message {
    error_reply(query, ResponseCode::NXDomain)
}

/// FORMERR answer echoing `query`.
#[must_use]
pub fn format_error(query: &Message) -> Message {
    error_reply(query, ResponseCode::FormErr)
}

fn error_reply(query: &Message, code: ResponseCode) -> Message {
    let mut reply = query.clone();
    reply.set_message_type(MessageType::Response);
    reply.set_recursion_available(true);
    reply.set_response_code(code);
    reply
}
