//! TLS-terminating listener that registers each connection's caller ID.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;
use tracing::debug;

use super::registry::{caller_id_from_sni, IdentityRegistry, RegistryGuard};
use crate::SrvError;

/// TCP listener that terminates TLS and records each connection's SNI.
pub struct IdentityListener {
    listener: TcpListener,
    acceptor: TlsAcceptor,
    registry: Arc<IdentityRegistry>,
    hostname: Arc<str>,
}

impl IdentityListener {
    /// Bind `addr`.
    pub async fn bind(
        addr: SocketAddr,
        acceptor: TlsAcceptor,
        registry: Arc<IdentityRegistry>,
        hostname: &str,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            acceptor,
            registry,
            hostname: Arc::from(hostname),
        })
    }

    /// Bound address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept a TCP connection. The TLS handshake is left to the caller so
    /// a slow client does not hold up the accept loop.
    pub async fn accept(&self) -> io::Result<Handshake> {
        let (stream, peer) = self.listener.accept().await?;
        Ok(Handshake {
            stream,
            peer,
            acceptor: self.acceptor.clone(),
            registry: Arc::clone(&self.registry),
            hostname: Arc::clone(&self.hostname),
        })
    }
}

/// An accepted connection waiting for its TLS handshake.
pub struct Handshake {
    stream: TcpStream,
    peer: SocketAddr,
    acceptor: TlsAcceptor,
    registry: Arc<IdentityRegistry>,
    hostname: Arc<str>,
}

impl Handshake {
    /// Remote address.
    #[must_use]
    pub const fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Run the TLS handshake and register the caller ID taken from SNI.
    ///
    /// Connections without SNI are not registered.
    pub async fn finish(self) -> crate::Result<TrackedStream> {
        let tls = self
            .acceptor
            .accept(self.stream)
            .await
            .map_err(|e| SrvError::Tls(format!("handshake with {} failed: {e}", self.peer)))?;

        let guard = tls.get_ref().1.server_name().map(|sni| {
            let caller_id = caller_id_from_sni(sni, &self.hostname);
            debug!(peer = %self.peer, caller = %caller_id, "TLS connection established");
            self.registry.register(self.peer, caller_id)
        });
        if guard.is_none() {
            debug!(peer = %self.peer, "TLS connection without SNI");
        }

        Ok(TrackedStream {
            inner: tls,
            peer: self.peer,
            _guard: guard,
        })
    }
}

/// A TLS stream whose registry entry is removed when it is dropped.
pub struct TrackedStream {
    inner: TlsStream<TcpStream>,
    peer: SocketAddr,
    _guard: Option<RegistryGuard>,
}

impl TrackedStream {
    /// Remote address.
    #[must_use]
    pub const fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl AsyncRead for TrackedStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for TrackedStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
