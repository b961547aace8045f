//! DNS-over-HTTPS endpoint (RFC 8484) at `/doh/{id}`.
//!
//! - `GET /doh/{id}?dns=<base64url>`
//! - `POST /doh/{id}` with `Content-Type: application/dns-message`
//!
//! The path segment is the caller ID.

use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use tracing::{debug, error, warn};

use super::AppState;
use crate::wire;

/// DNS wire-format media type.
pub const DNS_MESSAGE_CONTENT_TYPE: &str = "application/dns-message";

#[derive(Debug, Deserialize)]
pub struct DohGetParams {
    dns: Option<String>,
}

/// `GET /doh/{id}?dns=...`
pub async fn get_query(
    State(state): State<AppState>,
    Path(caller_id): Path<String>,
    Query(params): Query<DohGetParams>,
) -> Response {
    let Some(dns) = params.dns.filter(|d| !d.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Missing 'dns' parameter").into_response();
    };
    let Ok(data) = URL_SAFE_NO_PAD.decode(dns.trim_end_matches('=')) else {
        return (StatusCode::BAD_REQUEST, "Invalid DNS parameter encoding").into_response();
    };

    resolve(&state, &caller_id, &data).await
}

/// `POST /doh/{id}`
pub async fn post_query(
    State(state): State<AppState>,
    Path(caller_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::trim);
    if content_type != Some(DNS_MESSAGE_CONTENT_TYPE) {
        return (StatusCode::UNSUPPORTED_MEDIA_TYPE, "Unsupported Content-Type").into_response();
    }
    if body.is_empty() {
        return (StatusCode::BAD_REQUEST, "Empty DNS message").into_response();
    }

    resolve(&state, &caller_id, &body).await
}

async fn resolve(state: &AppState, caller_id: &str, data: &[u8]) -> Response {
    let query = match wire::decode(data) {
        Ok(query) => query,
        Err(e) => {
            debug!(caller = caller_id, error = %e, "Rejecting DoH query");
            return (StatusCode::BAD_REQUEST, "Invalid DNS message").into_response();
        }
    };

    let answer = match state.processor.process(caller_id, &query).await {
        Ok(answer) => answer,
        Err(e) => {
            warn!(caller = caller_id, id = query.id(), error = %e, "DoH resolution failed");
            return (StatusCode::BAD_GATEWAY, "DNS resolution failed").into_response();
        }
    };

    let bytes = match wire::encode(&answer) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(caller = caller_id, error = %e, "Cannot encode DoH answer");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode answer").into_response();
        }
    };

    let max_age = wire::cache_control_max_age(&answer);
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(DNS_MESSAGE_CONTENT_TYPE),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_str(&format!("max-age={max_age}"))
            .unwrap_or_else(|_| HeaderValue::from_static("no-store")),
    );
    response
}
