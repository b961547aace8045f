//! DoT tests over real TLS handshakes with a generated certificate.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, Query, ResponseCode};
use hickory_proto::rr::{Name, RecordType};
use rustls::pki_types::{CertificateDer, ServerName};
use rustls::{ClientConfig, RootCertStore};
use sieve_core::{Category, MemoryPolicyStore, Settings};
use sieve_srv::cache::ResponseCache;
use sieve_srv::config::DotConfig;
use sieve_srv::dot::{load_acceptor, DotServer, IdentityListener, IdentityRegistry};
use sieve_srv::filter::{DomainTrie, FilteringEngine};
use sieve_srv::upstream::Upstream;
use sieve_srv::{wire, QueryProcessor};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_rustls::{TlsAcceptor, TlsConnector};

const SNI: &str = "abc1234.dns.localhost";
const HOSTNAME: &str = "dns.localhost";

struct EchoUpstream;

#[async_trait]
impl Upstream for EchoUpstream {
    async fn resolve(&self, query: &Message) -> sieve_srv::Result<Message> {
        let mut answer = query.clone();
        answer.set_message_type(MessageType::Response);
        Ok(answer)
    }
}

/// Self-signed certificate for [`SNI`], written to `dir` and loaded.
fn acceptor(dir: &Path) -> (TlsAcceptor, CertificateDer<'static>) {
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec![SNI.to_string()]).unwrap();
    let cert_path = dir.join("cert.pem");
    let key_path = dir.join("key.pem");
    std::fs::write(&cert_path, cert.pem()).unwrap();
    std::fs::write(&key_path, key_pair.serialize_pem()).unwrap();

    (load_acceptor(&cert_path, &key_path).unwrap(), cert.der().clone())
}

fn connector(cert: CertificateDer<'static>) -> TlsConnector {
    let mut roots = RootCertStore::empty();
    roots.add(cert).unwrap();
    let config =
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_root_certificates(roots)
            .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
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

fn free_addr() -> SocketAddr {
    let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    probe.local_addr().unwrap()
}

/// Connect once the server has bound `addr`.
async fn connect(addr: SocketAddr) -> TcpStream {
    for _ in 0..50 {
        if let Ok(stream) = TcpStream::connect(addr).await {
            return stream;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("DoT listener never bound {addr}");
}

fn dot_server(
    dir: &Path,
    handshake_timeout_secs: u64,
) -> (DotServer, SocketAddr, CertificateDer<'static>) {
    let (acceptor, cert) = acceptor(dir);
    let addr = free_addr();
    let config = DotConfig {
        listen: addr,
        handshake_timeout_secs,
        ..DotConfig::default()
    };
    (DotServer::new(config, HOSTNAME, acceptor, processor()), addr, cert)
}

fn query_bytes(id: u16, name: &str) -> Vec<u8> {
    let mut message = Message::new();
    message.set_id(id);
    message.add_query(Query::query(Name::from_ascii(name).unwrap(), RecordType::A));
    message.to_vec().unwrap()
}

#[tokio::test]
async fn test_handshake_registers_caller_until_stream_drops() {
    let dir = tempfile::tempdir().unwrap();
    let (acceptor, cert) = acceptor(dir.path());
    let registry = Arc::new(IdentityRegistry::new());
    let listener = IdentityListener::bind(
        "127.0.0.1:0".parse().unwrap(),
        acceptor,
        Arc::clone(&registry),
        HOSTNAME,
    )
    .await
    .unwrap();
    let addr = listener.local_addr().unwrap();

    let accepted =
        tokio::spawn(async move { listener.accept().await.unwrap().finish().await.unwrap() });

    let tcp = TcpStream::connect(addr).await.unwrap();
    let client_addr = tcp.local_addr().unwrap();
    let client = connector(cert)
        .connect(ServerName::try_from(SNI).unwrap(), tcp)
        .await
        .unwrap();
    let stream = accepted.await.unwrap();

    assert_eq!(stream.peer_addr(), client_addr);
    assert_eq!(registry.lookup(&client_addr).as_deref(), Some("abc1234"));

    drop(stream);
    assert_eq!(registry.lookup(&client_addr), None);
    assert!(registry.is_empty());
    drop(client);
}

#[tokio::test]
async fn test_queries_are_filtered_for_sni_caller() {
    let dir = tempfile::tempdir().unwrap();
    let (server, addr, cert) = dot_server(dir.path(), 10);
    let registry = Arc::clone(server.registry());
    let (tx, rx) = watch::channel(false);
    let task = tokio::spawn(server.run(rx));

    let tcp = connect(addr).await;
    let client_addr = tcp.local_addr().unwrap();
    let mut client = connector(cert)
        .connect(ServerName::try_from(SNI).unwrap(), tcp)
        .await
        .unwrap();

    wire::write_frame(&mut client, &query_bytes(7, "ads.example.com.")).await.unwrap();
    let blocked = wire::decode(&wire::read_frame(&mut client).await.unwrap().unwrap()).unwrap();
    assert_eq!(blocked.id(), 7);
    assert_eq!(blocked.response_code(), ResponseCode::NXDomain);
    assert_eq!(registry.lookup(&client_addr).as_deref(), Some("abc1234"));

    wire::write_frame(&mut client, &query_bytes(8, "www.example.org.")).await.unwrap();
    let allowed = wire::decode(&wire::read_frame(&mut client).await.unwrap().unwrap()).unwrap();
    assert_eq!(allowed.response_code(), ResponseCode::NoError);

    drop(client);
    for _ in 0..100 {
        if registry.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(registry.is_empty());

    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("DoT server did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_shutdown_drops_client_stuck_before_handshake() {
    let dir = tempfile::tempdir().unwrap();
    let (server, addr, _cert) = dot_server(dir.path(), 60);
    let (tx, rx) = watch::channel(false);
    let task = tokio::spawn(server.run(rx));

    // Connected, but never sends a ClientHello.
    let mut silent = connect(addr).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("DoT server did not stop")
        .unwrap();

    let mut buf = [0u8; 16];
    assert_eq!(silent.read(&mut buf).await.unwrap(), 0);
}

#[tokio::test]
async fn test_handshake_timeout_closes_silent_client() {
    let dir = tempfile::tempdir().unwrap();
    let (server, addr, _cert) = dot_server(dir.path(), 1);
    let (tx, rx) = watch::channel(false);
    let task = tokio::spawn(server.run(rx));

    let mut silent = connect(addr).await;
    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(Duration::from_secs(5), silent.read(&mut buf))
        .await
        .expect("silent client was not disconnected");
    assert_eq!(read.unwrap(), 0);

    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("DoT server did not stop")
        .unwrap();
}
