//! Request identification and upstream header preparation.
//!
//! # Responsibilities
//! - Generate a UUID request ID as early as possible
//! - Attach it to the request span and echo it to the client
//! - Rewrite headers of a request forwarded to a pod
//!
//! # Design Decisions
//! - An incoming `x-request-id` is kept, not replaced
//! - Original request preserved for logging; modified copy forwarded

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::Span;

use crate::http::response::strip_hop_by_hop;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Layer assigning a UUID v4 request ID when the client sent none.
pub fn set_request_id() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

/// Layer copying the request ID onto the response.
pub fn propagate_request_id() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

/// Request ID of a request, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Span for one inbound request.
pub fn request_span(request: &Request<Body>) -> Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id(request.headers()),
    )
}

/// Prepare headers of a request about to be sent to `authority`.
///
/// Strips hop-by-hop headers, records the client in `X-Forwarded-*` and
/// points `Host` at the pod.
pub fn prepare_upstream(headers: &mut HeaderMap, peer: Option<SocketAddr>, authority: &str) {
    let original_host = headers.get(header::HOST).cloned();
    strip_hop_by_hop(headers);

    if let Some(peer) = peer {
        let client_ip = peer.ip().to_string();
        let forwarded = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(prior) => format!("{prior}, {client_ip}"),
            None => client_ip,
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    if let Some(host) = original_host {
        headers.insert(X_FORWARDED_HOST, host);
    }
    headers
        .entry(X_FORWARDED_PROTO)
        .or_insert(HeaderValue::from_static("http"));

    if let Ok(value) = HeaderValue::from_str(authority) {
        headers.insert(header::HOST, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_upstream() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("office.example.com"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));

        prepare_upstream(&mut headers, Some("198.51.100.4:5555".parse().unwrap()), "10.0.0.1:9980");

        assert_eq!(headers[header::HOST], "10.0.0.1:9980");
        assert_eq!(headers["x-forwarded-for"], "203.0.113.9, 198.51.100.4");
        assert_eq!(headers["x-forwarded-host"], "office.example.com");
        assert_eq!(headers["x-forwarded-proto"], "http");
        assert!(headers.get(header::CONNECTION).is_none());
    }

    #[test]
    fn test_request_id_fallback() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_id(&headers), "unknown");
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("abc"));
        assert_eq!(request_id(&headers), "abc");
    }
}
