//! Query forwarding to the upstream pool.
//!
//! Each query goes to one address picked by the [`UpstreamSelector`]. UDP is
//! tried first; any UDP failure (timeout, I/O, undecodable reply, ID
//! mismatch) is retried once over TCP against the same address. There is
//! no failover to other addresses.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hickory_proto::op::Message;
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;
use tracing::{debug, warn};

use super::UpstreamSelector;
use crate::{wire, SrvError};

/// Largest UDP reply accepted.
const UDP_RECV_BUFFER_SIZE: usize = 4096;

/// Something that answers DNS queries.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Resolve `query`, returning the upstream's answer.
    async fn resolve(&self, query: &Message) -> crate::Result<Message>;
}

/// Forwards queries to the upstream pool over UDP, falling back to TCP.
#[derive(Debug, Clone)]
pub struct UpstreamResolver {
    selector: Arc<UpstreamSelector>,
    timeout: Duration,
}

impl UpstreamResolver {
    /// Create a resolver over `selector` with a per-exchange timeout.
    #[must_use]
    pub const fn new(selector: Arc<UpstreamSelector>, timeout: Duration) -> Self {
        Self { selector, timeout }
    }

    /// The address pool.
    #[must_use]
    pub const fn selector(&self) -> &Arc<UpstreamSelector> {
        &self.selector
    }

    async fn query_udp(
        &self,
        server: SocketAddr,
        query: &Message,
        bytes: &[u8],
    ) -> crate::Result<Message> {
        let bind: SocketAddr = if server.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(bind).await?;
        socket.send_to(bytes, server).await?;

        let mut buf = vec![0u8; UDP_RECV_BUFFER_SIZE];
        let (len, src) = timeout(self.timeout, socket.recv_from(&mut buf))
            .await
            .map_err(|_| SrvError::Timeout {
                server: server.to_string(),
                timeout: self.timeout,
            })??;

        if src != server {
            return Err(SrvError::upstream(
                server,
                format!("reply from unexpected source {src}"),
            ));
        }

        let response = wire::decode(&buf[..len])?;
        check_id(server, query, &response)?;
        Ok(response)
    }

    async fn query_tcp(
        &self,
        server: SocketAddr,
        query: &Message,
        bytes: &[u8],
    ) -> crate::Result<Message> {
        let exchange = async {
            let mut stream = TcpStream::connect(server).await?;
            wire::write_frame(&mut stream, bytes).await?;
            wire::read_frame(&mut stream)
                .await?
                .ok_or_else(|| SrvError::upstream(server, "connection closed before reply"))
        };

        let reply = timeout(self.timeout, exchange)
            .await
            .map_err(|_| SrvError::Timeout {
                server: server.to_string(),
                timeout: self.timeout,
            })??;

        let response = wire::decode(&reply)?;
        check_id(server, query, &response)?;
        Ok(response)
    }
}

#[async_trait]
impl Upstream for UpstreamResolver {
    async fn resolve(&self, query: &Message) -> crate::Result<Message> {
        let server = self.selector.next();
        let bytes = wire::encode(query)?;

        match self.query_udp(server, query, &bytes).await {
            Ok(response) => Ok(response),
            Err(e) => {
                debug!(upstream = %server, error = %e, "UDP exchange failed, retrying over TCP");
                self.query_tcp(server, query, &bytes)
                    .await
                    .map_err(|e| match e {
                        SrvError::Io(_) | SrvError::Wire(_) => SrvError::upstream(server, e),
                        other => other,
                    })
                    .inspect_err(|e| {
                        warn!(upstream = %server, error = %e, "Upstream exchange failed");
                    })
            }
        }
    }
}

fn check_id(server: SocketAddr, query: &Message, response: &Message) -> crate::Result<()> {
    if response.id() == query.id() {
        Ok(())
    } else {
        Err(SrvError::upstream(
            server,
            format!("transaction ID mismatch: sent {}, got {}", query.id(), response.id()),
        ))
    }
}
