//! DoH endpoint tests against an in-process router.

use std::net::Ipv4Addr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{header, StatusCode};
use axum_test::{TestResponse, TestServer};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hickory_proto::op::{Message, MessageType, Query, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{Name, RData, Record, RecordType};
use sieve_core::{Category, MemoryPolicyStore, PolicyStore, Settings};
use sieve_srv::cache::ResponseCache;
use sieve_srv::filter::{DomainTrie, FilteringEngine};
use sieve_srv::http::{router, AppState};
use sieve_srv::presets::PresetService;
use sieve_srv::upstream::Upstream;
use sieve_srv::{QueryProcessor, SrvError};

/// Answers with a fixed A record, or fails when `fail` is set.
struct StaticUpstream {
    ttl: u32,
    fail: bool,
}

#[async_trait]
impl Upstream for StaticUpstream {
    async fn resolve(&self, query: &Message) -> sieve_srv::Result<Message> {
        if self.fail {
            return Err(SrvError::upstream("192.0.2.53:53", "unreachable"));
        }
        let mut answer = query.clone();
        answer.set_message_type(MessageType::Response);
        answer.set_recursion_available(true);
        answer.add_answer(Record::from_rdata(
            query.queries()[0].name().clone(),
            self.ttl,
            RData::A(A(Ipv4Addr::new(203, 0, 113, 5))),
        ));
        Ok(answer)
    }
}

fn server(upstream: StaticUpstream) -> TestServer {
    let mut trie = DomainTrie::new();
    trie.insert("ads.example.com", "ads");

    let mut enabled = Settings::new("abc1234", "kids");
    enabled.categories.insert("ads".into(), Category::Blocked);
    let mut disabled = Settings::new("off0000", "paused");
    disabled.enabled = false;
    disabled.categories.insert("ads".into(), Category::Blocked);

    let store: Arc<dyn PolicyStore> =
        Arc::new(MemoryPolicyStore::with_configs([enabled, disabled]));
    let processor = QueryProcessor::new(
        FilteringEngine::new(Arc::new(trie), Arc::clone(&store)),
        ResponseCache::with_limits(100, 60, 86400),
        Arc::new(upstream),
    );

    let app = router(AppState {
        processor,
        presets: Arc::new(PresetService::new(store, vec!["ads".into()])),
    });
    TestServer::new(app).unwrap()
}

fn ok_upstream(ttl: u32) -> StaticUpstream {
    StaticUpstream { ttl, fail: false }
}

fn query(id: u16, name: &str) -> Vec<u8> {
    let mut message = Message::new();
    message.set_id(id);
    message.set_recursion_desired(true);
    message.add_query(Query::query(Name::from_ascii(name).unwrap(), RecordType::A));
    message.to_vec().unwrap()
}

async fn get(server: &TestServer, caller: &str, wire: &[u8]) -> TestResponse {
    server
        .get(&format!("/doh/{caller}"))
        .add_query_param("dns", URL_SAFE_NO_PAD.encode(wire))
        .await
}

fn answer(response: &TestResponse) -> Message {
    Message::from_vec(response.as_bytes()).unwrap()
}

#[tokio::test]
async fn test_get_disabled_caller_returns_upstream_answer() {
    let server = server(ok_upstream(300));
    let response = get(&server, "off0000", &query(77, "ads.example.com.")).await;

    response.assert_status_ok();
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "application/dns-message");
    assert!(headers.contains_key(header::CONTENT_LENGTH));
    assert_eq!(headers[header::CACHE_CONTROL], "max-age=300");

    let answer = answer(&response);
    assert_eq!(answer.id(), 77);
    assert_eq!(answer.response_code(), ResponseCode::NoError);
    assert_eq!(answer.answers().len(), 1);
    assert_eq!(answer.answers()[0].ttl(), 300);
}

#[tokio::test]
async fn test_cache_control_has_floor() {
    let server = server(ok_upstream(2));
    let response = get(&server, "off0000", &query(1, "www.example.org.")).await;

    response.assert_status_ok();
    assert_eq!(response.headers()[header::CACHE_CONTROL], "max-age=10");
}

#[tokio::test]
async fn test_blocked_domain_gets_nxdomain() {
    let server = server(ok_upstream(300));
    let response = get(&server, "abc1234", &query(5, "ads.example.com.")).await;

    response.assert_status_ok();
    // No records, so the default max-age applies.
    assert_eq!(response.headers()[header::CACHE_CONTROL], "max-age=3600");

    let answer = answer(&response);
    assert_eq!(answer.id(), 5);
    assert_eq!(answer.response_code(), ResponseCode::NXDomain);
    assert!(answer.answers().is_empty());
}

#[tokio::test]
async fn test_unknown_caller_gets_nxdomain() {
    let server = server(ok_upstream(300));
    let response = get(&server, "nobody0", &query(6, "www.example.org.")).await;

    response.assert_status_ok();
    assert_eq!(answer(&response).response_code(), ResponseCode::NXDomain);
}

#[tokio::test]
async fn test_post_with_dns_message_body() {
    let server = server(ok_upstream(60));
    let response = server
        .post("/doh/abc1234")
        .content_type("application/dns-message")
        .bytes(Bytes::from(query(9, "www.example.org.")))
        .await;

    response.assert_status_ok();
    let answer = answer(&response);
    assert_eq!(answer.id(), 9);
    assert_eq!(answer.answers().len(), 1);
}

#[tokio::test]
async fn test_post_wrong_content_type_is_415() {
    let server = server(ok_upstream(60));
    let response = server
        .post("/doh/abc1234")
        .content_type("application/json")
        .bytes(Bytes::from(query(9, "www.example.org.")))
        .await;

    response.assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_malformed_requests_are_400() {
    let server = server(ok_upstream(60));

    server
        .get("/doh/abc1234")
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .get("/doh/abc1234")
        .add_query_param("dns", "****")
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    get(&server, "abc1234", &[1, 2, 3])
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .post("/doh/abc1234")
        .content_type("application/dns-message")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_other_methods_are_405() {
    let server = server(ok_upstream(60));
    server
        .put("/doh/abc1234")
        .await
        .assert_status(StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_upstream_failure_is_502() {
    let server = server(StaticUpstream { ttl: 0, fail: true });
    get(&server, "abc1234", &query(3, "www.example.org."))
        .await
        .assert_status(StatusCode::BAD_GATEWAY);
}
