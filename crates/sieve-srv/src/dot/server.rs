//! DoT serve supervisor and per-connection query loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

use super::listener::{Handshake, IdentityListener};
use super::registry::IdentityRegistry;
use crate::config::DotConfig;
use crate::processor::QueryProcessor;
use crate::{wire, SrvError};

/// Supervises the DoT listener.
///
/// A failed bind is retried after `bind_retry_secs`; a serve loop that ends
/// with an error is restarted after `restart_delay_secs`. Each attempt binds
/// a fresh listener and drops it before the next one. Connection tasks
/// outlive restarts and are drained on shutdown. A TLS handshake that does
/// not finish within `handshake_timeout_secs`, or before shutdown, drops the
/// connection.
pub struct DotServer {
    config: DotConfig,
    hostname: String,
    acceptor: TlsAcceptor,
    processor: QueryProcessor,
    registry: Arc<IdentityRegistry>,
}

impl DotServer {
    /// Create a supervisor.
    pub fn new(
        config: DotConfig,
        hostname: impl Into<String>,
        acceptor: TlsAcceptor,
        processor: QueryProcessor,
    ) -> Self {
        Self {
            config,
            hostname: hostname.into(),
            acceptor,
            processor,
            registry: Arc::new(IdentityRegistry::new()),
        }
    }

    /// Registry of live connections.
    #[must_use]
    pub const fn registry(&self) -> &Arc<IdentityRegistry> {
        &self.registry
    }

    /// Serve until `shutdown` flips to `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let bind_retry = Duration::from_secs(self.config.bind_retry_secs);
        let restart_delay = Duration::from_secs(self.config.restart_delay_secs);
        let mut connections = JoinSet::new();

        while !*shutdown.borrow() {
            let listener = match IdentityListener::bind(
                self.config.listen,
                self.acceptor.clone(),
                Arc::clone(&self.registry),
                &self.hostname,
            )
            .await
            {
                Ok(listener) => listener,
                Err(e) => {
                    warn!(addr = %self.config.listen, error = %e, retry_secs = bind_retry.as_secs(), "DoT bind failed");
                    if pause_or_shutdown(bind_retry, &mut shutdown).await {
                        break;
                    }
                    continue;
                }
            };
            info!(addr = %self.config.listen, "DoT listener bound");

            let result = self.serve(&listener, &mut connections, &mut shutdown).await;
            drop(listener);

            match result {
                Ok(()) => break,
                Err(e) => {
                    error!(error = %e, "DoT serve loop failed, restarting");
                    if pause_or_shutdown(restart_delay, &mut shutdown).await {
                        break;
                    }
                }
            }
        }

        debug!(in_flight = connections.len(), "Draining DoT connections");
        while connections.join_next().await.is_some() {}
        info!("DoT server stopped");
    }

    /// Accept until shutdown (`Ok`) or an accept error (`Err`).
    async fn serve(
        &self,
        listener: &IdentityListener,
        connections: &mut JoinSet<()>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> crate::Result<()> {
        loop {
            while connections.try_join_next().is_some() {}

            tokio::select! {
                _ = shutdown.changed() => return Ok(()),
                accepted = listener.accept() => {
                    let handshake = accepted
                        .map_err(|e| SrvError::Server(format!("accept failed: {e}")))?;
                    connections.spawn(handle_connection(
                        handshake,
                        Duration::from_secs(self.config.handshake_timeout_secs),
                        self.processor.clone(),
                        Arc::clone(&self.registry),
                        shutdown.clone(),
                    ));
                }
            }
        }
    }
}

async fn handle_connection(
    handshake: Handshake,
    handshake_timeout: Duration,
    processor: QueryProcessor,
    registry: Arc<IdentityRegistry>,
    mut shutdown: watch::Receiver<bool>,
) {
    let peer = handshake.peer_addr();
    // A clone taken after the flip never sees `changed()`.
    if *shutdown.borrow() {
        return;
    }
    let finished = tokio::select! {
        _ = shutdown.changed() => {
            debug!(peer = %peer, "Shutdown during TLS handshake");
            return;
        }
        finished = tokio::time::timeout(handshake_timeout, handshake.finish()) => finished,
    };

    let stream = match finished {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            debug!(peer = %peer, error = %e, "Closing connection");
            return;
        }
        Err(_) => {
            debug!(peer = %peer, timeout_secs = handshake_timeout.as_secs(), "TLS handshake timed out");
            return;
        }
    };

    // Missing entry (no SNI) yields an empty ID, which no policy matches.
    let caller_id = registry.lookup(&peer).unwrap_or_default();
    serve_connection(stream, &caller_id, &processor, shutdown).await;
}

/// Answer length-prefixed queries on `stream` until EOF, a framing or
/// decode error, or shutdown.
///
/// Upstream failures skip the answer for that query and keep the
/// connection open.
pub async fn serve_connection<S>(
    mut stream: S,
    caller_id: &str,
    processor: &QueryProcessor,
    mut shutdown: watch::Receiver<bool>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let frame = tokio::select! {
            _ = shutdown.changed() => break,
            frame = wire::read_frame(&mut stream) => frame,
        };

        let bytes = match frame {
            Ok(Some(bytes)) => bytes,
            Ok(None) => break,
            Err(e) => {
                debug!(caller = caller_id, error = %e, "Read failed, closing connection");
                break;
            }
        };

        let query = match wire::decode(&bytes) {
            Ok(query) => query,
            Err(e) => {
                debug!(caller = caller_id, error = %e, "Malformed query, closing connection");
                break;
            }
        };

        let answer = match processor.process(caller_id, &query).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(caller = caller_id, id = query.id(), error = %e, "No answer for query");
                continue;
            }
        };

        let written = match wire::encode(&answer) {
            Ok(bytes) => wire::write_frame(&mut stream, &bytes).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            debug!(caller = caller_id, error = %e, "Write failed, closing connection");
            break;
        }
    }
}

/// Sleep for `delay`. Returns `true` if shutdown was requested meanwhile.
async fn pause_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        () = tokio::time::sleep(delay) => *shutdown.borrow(),
        _ = shutdown.changed() => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResponseCache;
    use crate::filter::{DomainTrie, FilteringEngine};
    use crate::upstream::Upstream;
    use async_trait::async_trait;
    use hickory_proto::op::{Message, MessageType, Query, ResponseCode};
    use hickory_proto::rr::{Name, RecordType};
    use sieve_core::{Category, MemoryPolicyStore, Settings};
    use tokio::io::AsyncWriteExt;

    struct EchoUpstream;

    #[async_trait]
    impl Upstream for EchoUpstream {
        async fn resolve(&self, query: &Message) -> crate::Result<Message> {
            let mut answer = query.clone();
            answer.set_message_type(MessageType::Response);
            Ok(answer)
        }
    }

    fn processor() -> QueryProcessor {
        let mut trie = DomainTrie::new();
        trie.insert("ads.example.com", "ads");
        let mut settings = Settings::new("abc1234", "kids");
        settings.categories.insert("ads".into(), Category::Blocked);

        QueryProcessor::new(
            FilteringEngine::new(
                Arc::new(trie),
                Arc::new(MemoryPolicyStore::with_configs([settings])),
            ),
            ResponseCache::with_limits(100, 60, 86400),
            Arc::new(EchoUpstream),
        )
    }

    fn query_bytes(id: u16, name: &str) -> Vec<u8> {
        let mut message = Message::new();
        message.set_id(id);
        message.add_query(Query::query(Name::from_ascii(name).unwrap(), RecordType::A));
        message.to_vec().unwrap()
    }

    #[tokio::test]
    async fn test_connection_answers_each_frame() {
        let (mut client, server) = tokio::io::duplex(4096);
        let (_tx, rx) = watch::channel(false);
        let processor = processor();
        let task = tokio::spawn(async move {
            serve_connection(server, "abc1234", &processor, rx).await;
        });

        wire::write_frame(&mut client, &query_bytes(1, "ads.example.com.")).await.unwrap();
        let blocked = wire::decode(&wire::read_frame(&mut client).await.unwrap().unwrap()).unwrap();
        assert_eq!(blocked.id(), 1);
        assert_eq!(blocked.response_code(), ResponseCode::NXDomain);

        wire::write_frame(&mut client, &query_bytes(2, "www.example.org.")).await.unwrap();
        let allowed = wire::decode(&wire::read_frame(&mut client).await.unwrap().unwrap()).unwrap();
        assert_eq!(allowed.id(), 2);
        assert_eq!(allowed.response_code(), ResponseCode::NoError);

        drop(client);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_caller_fails_closed() {
        let (mut client, server) = tokio::io::duplex(4096);
        let (_tx, rx) = watch::channel(false);
        let processor = processor();
        let task = tokio::spawn(async move {
            serve_connection(server, "", &processor, rx).await;
        });

        wire::write_frame(&mut client, &query_bytes(9, "www.example.org.")).await.unwrap();
        let reply = wire::decode(&wire::read_frame(&mut client).await.unwrap().unwrap()).unwrap();
        assert_eq!(reply.response_code(), ResponseCode::NXDomain);

        drop(client);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_query_drops_connection() {
        let (mut client, server) = tokio::io::duplex(4096);
        let (_tx, rx) = watch::channel(false);
        let processor = processor();
        let task = tokio::spawn(async move {
            serve_connection(server, "abc1234", &processor, rx).await;
        });

        client.write_all(&[0, 3, 1, 2, 3]).await.unwrap();
        task.await.unwrap();
        assert_eq!(wire::read_frame(&mut client).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_shutdown_ends_idle_connection() {
        let (_client, server) = tokio::io::duplex(4096);
        let (tx, rx) = watch::channel(false);
        let processor = processor();
        let task = tokio::spawn(async move {
            serve_connection(server, "abc1234", &processor, rx).await;
        });

        tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_returns_early_on_shutdown() {
        let (tx, mut rx) = watch::channel(false);
        let waiter = tokio::spawn(async move { pause_or_shutdown(Duration::from_secs(5), &mut rx).await });
        tx.send(true).unwrap();
        assert!(waiter.await.unwrap());

        let (_tx, mut rx) = watch::channel(false);
        assert!(!pause_or_shutdown(Duration::from_secs(1), &mut rx).await);
    }
}
