//! Query pipeline tests with blocklists on disk and a local UDP upstream.

use std::io::Write;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use hickory_proto::op::{Message, MessageType, Query, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{Name, RData, Record, RecordType};
use sieve_core::{Category, MemoryPolicyStore, Settings};
use sieve_srv::cache::ResponseCache;
use sieve_srv::config::CategorySource;
use sieve_srv::filter::{load_blocklists, FilteringEngine};
use sieve_srv::upstream::{UpstreamResolver, UpstreamSelector};
use sieve_srv::QueryProcessor;
use tokio::net::UdpSocket;

fn blocklist(dir: &std::path::Path) -> CategorySource {
    let file = dir.join("ads.txt");
    let mut handle = std::fs::File::create(&file).unwrap();
    writeln!(handle, "# advertising").unwrap();
    writeln!(handle, "ads.example.com").unwrap();
    CategorySource {
        name: "ads".into(),
        file,
    }
}

fn caller() -> Settings {
    let mut settings = Settings::new("abc1234", "kids");
    settings.categories.insert("ads".into(), Category::Blocked);
    settings
}

fn query(id: u16, name: &str) -> Message {
    let mut message = Message::new();
    message.set_id(id);
    message.add_query(Query::query(Name::from_ascii(name).unwrap(), RecordType::A));
    message
}

/// Answer `count` UDP queries with one A record each.
async fn udp_upstream(socket: UdpSocket, count: usize) {
    let mut buf = vec![0u8; 512];
    for _ in 0..count {
        let (len, peer) = socket.recv_from(&mut buf).await.unwrap();
        let mut reply = Message::from_vec(&buf[..len]).unwrap();
        reply.set_message_type(MessageType::Response);
        let name = reply.queries()[0].name().clone();
        reply.add_answer(Record::from_rdata(
            name,
            120,
            RData::A(A(Ipv4Addr::new(198, 51, 100, 1))),
        ));
        socket.send_to(&reply.to_vec().unwrap(), peer).await.unwrap();
    }
}

#[tokio::test]
async fn test_decide_against_loaded_blocklist() {
    let dir = tempfile::tempdir().unwrap();
    let trie = load_blocklists(&[blocklist(dir.path())]).unwrap();
    let engine = FilteringEngine::new(
        Arc::new(trie),
        Arc::new(MemoryPolicyStore::with_configs([caller()])),
    );

    assert!(engine.decide("abc1234", "ads.example.com.").await.unwrap());
    assert!(!engine.decide("abc1234", "unlisted.example.org.").await.unwrap());
}

#[tokio::test]
async fn test_pipeline_forwards_allowed_and_blocks_listed() {
    let dir = tempfile::tempdir().unwrap();
    let trie = load_blocklists(&[blocklist(dir.path())]).unwrap();

    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let upstream_addr = socket.local_addr().unwrap();
    // One query reaches the upstream; the repeat is served from cache.
    let upstream = tokio::spawn(udp_upstream(socket, 1));

    let resolver = UpstreamResolver::new(
        Arc::new(UpstreamSelector::new(vec![upstream_addr])),
        Duration::from_secs(2),
    );
    let processor = QueryProcessor::new(
        FilteringEngine::new(
            Arc::new(trie),
            Arc::new(MemoryPolicyStore::with_configs([caller()])),
        ),
        ResponseCache::with_limits(100, 60, 86400),
        Arc::new(resolver),
    );

    let blocked = processor
        .process("abc1234", &query(1, "ads.example.com."))
        .await
        .unwrap();
    assert_eq!(blocked.response_code(), ResponseCode::NXDomain);

    let first = processor
        .process("abc1234", &query(2, "www.example.org."))
        .await
        .unwrap();
    assert_eq!(first.id(), 2);
    assert_eq!(first.answers().len(), 1);

    let cached = processor
        .process("abc1234", &query(3, "www.example.org."))
        .await
        .unwrap();
    assert_eq!(cached.id(), 3);
    assert_eq!(cached.answers()[0].ttl(), 120);

    upstream.await.unwrap();
}
