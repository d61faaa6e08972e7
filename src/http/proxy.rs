//! Plain HTTP forwarding to the pod serving a session.
//!
//! # Responsibilities
//! - Find the session in the query, or in a URL-encoded form body
//! - Place the session and forward the request to the pod
//! - Stream the pod's response back with CORS headers added
//!
//! A failed pod request is answered with 502; requests are never retried.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Instant;

use axum::{
    body::Body,
    http::{
        uri::{Authority, PathAndQuery, Scheme},
        Request, Uri, Version,
    },
    response::Response,
};
use hyper::body::Incoming;

use crate::error::DistributorError;
use crate::http::request::{prepare_upstream, request_id};
use crate::http::response::{apply_cors, strip_hop_by_hop};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::routing::session::is_form_body;

/// Forward a plain request.
pub async fn forward(
    state: AppState,
    peer: Option<SocketAddr>,
    request: Request<Body>,
) -> Result<Response, DistributorError> {
    let start = Instant::now();
    let (mut parts, body) = request.into_parts();
    let method = parts.method.to_string();

    let (session, body) = match state.sessions.from_query(parts.uri.query()) {
        Some(session) => (session, body),
        None if is_form_body(&parts.headers) => {
            let bytes = axum::body::to_bytes(body, state.max_form_body_bytes)
                .await
                .map_err(|_| DistributorError::BodyTooLarge(state.max_form_body_bytes))?;
            let session = state.sessions.from_form_body(&bytes).unwrap_or_default();
            (session, Body::from(bytes))
        }
        None => (String::new(), body),
    };

    let placement = state.router.place(&session).await.inspect_err(|e| {
        metrics::record_request(&method, e.status().as_u16(), "none", start);
    })?;
    let pod = placement.pod;
    let authority = pod.authority(state.backend_port);

    tracing::debug!(
        request_id = %request_id(&parts.headers),
        session = %session,
        pod = %pod,
        placement = placement.kind.as_str(),
        "Forwarding request"
    );

    let upstream_failure = |reason: String| DistributorError::Upstream {
        pod: pod.clone(),
        reason,
    };

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority =
        Some(Authority::from_str(&authority).map_err(|e| upstream_failure(e.to_string()))?);
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = Uri::from_parts(uri_parts).map_err(|e| upstream_failure(e.to_string()))?;
    parts.version = Version::HTTP_11;
    prepare_upstream(&mut parts.headers, peer, &authority);

    let response: Response<Incoming> = state
        .client
        .request(Request::from_parts(parts, body))
        .await
        .map_err(|e| {
            metrics::record_request(&method, 502, pod.as_str(), start);
            tracing::error!(pod = %pod, error = %e, "Pod request failed");
            upstream_failure(e.to_string())
        })?;

    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    apply_cors(&mut parts.headers);
    metrics::record_request(&method, parts.status.as_u16(), pod.as_str(), start);

    Ok(Response::from_parts(parts, Body::new(body)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DistributorConfig;
    use crate::store::MemoryStore;
    use axum::http::{header, StatusCode};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_oversized_form_rejected_before_placement() {
        let store = MemoryStore::new();
        let mut config = DistributorConfig::default();
        config.routing.max_form_body_bytes = 16;
        let state = AppState::new(&config, Arc::new(store.clone()));

        let request = Request::post("/convert-to")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("WOPISrc=doc&padding=0123456789abcdef"))
            .unwrap();

        let Err(err) = forward(state, None, request).await else {
            panic!("oversized form body was forwarded");
        };
        assert!(matches!(err, DistributorError::BodyTooLarge(16)));
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(store.is_empty());
    }
}
