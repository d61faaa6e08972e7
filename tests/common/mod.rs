//! Shared utilities for integration tests: mock pods and a running distributor.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, HeaderMap, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use session_distributor::store::{CoordinationStore, MemoryStore};
use session_distributor::{DistributorConfig, HttpServer, Shutdown};

/// What a mock pod observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PodEvent {
    Opened { host: String, origin: String },
    Closed,
}

/// Handle to a running mock pod.
pub struct MockPod {
    pub addr: SocketAddr,
    pub events: mpsc::UnboundedReceiver<PodEvent>,
}

impl MockPod {
    /// Wait for the next event, failing the test after a few seconds.
    pub async fn next_event(&mut self) -> PodEvent {
        tokio::time::timeout(Duration::from_secs(5), self.events.recv())
            .await
            .expect("pod event timed out")
            .expect("pod stopped")
    }
}

/// Start a pod on 127.0.0.1 that echoes WebSocket frames under `/cool/` and
/// echoes plain request bodies everywhere else.
///
/// Tunnels whose path contains `/close-at-once/` are closed by the pod with
/// code 4000 right after the upgrade.
pub async fn start_mock_pod() -> MockPod {
    let (tx, events) = mpsc::unbounded_channel();
    let app = Router::new()
        .route("/cool/{*path}", get(echo_socket))
        .fallback(echo_http)
        .with_state(tx);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockPod { addr, events }
}

async fn echo_socket(
    State(events): State<mpsc::UnboundedSender<PodEvent>>,
    headers: HeaderMap,
    uri: Uri,
    upgrade: WebSocketUpgrade,
) -> Response {
    let text = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    let opened = PodEvent::Opened {
        host: text(header::HOST),
        origin: text(header::ORIGIN),
    };

    let close_at_once = uri.path().contains("/close-at-once/");

    upgrade.on_upgrade(move |mut socket| async move {
        let _ = events.send(opened);
        if close_at_once {
            let frame = CloseFrame {
                code: 4000,
                reason: "document unloaded".into(),
            };
            if socket.send(Message::Close(Some(frame))).await.is_ok() {
                while let Some(Ok(_)) = socket.recv().await {}
            }
        } else {
            echo(socket).await;
        }
        let _ = events.send(PodEvent::Closed);
    })
}

async fn echo(mut socket: WebSocket) {
    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Close(_) => break,
            Message::Text(_) | Message::Binary(_) => {
                if socket.send(message).await.is_err() {
                    break;
                }
            }
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }
}

/// Echo the body back, exposing what the pod saw in `x-seen-*` headers.
async fn echo_http(request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
    let seen = |name: &str| {
        parts
            .headers
            .get(name)
            .cloned()
            .unwrap_or_else(|| header::HeaderValue::from_static(""))
    };

    let mut response = (StatusCode::OK, bytes).into_response();
    let headers = response.headers_mut();
    headers.insert("x-seen-host", seen("host"));
    headers.insert("x-seen-forwarded-for", seen("x-forwarded-for"));
    headers.insert("x-seen-forwarded-host", seen("x-forwarded-host"));
    headers.insert(
        "x-seen-path",
        header::HeaderValue::from_str(&parts.uri.to_string()).unwrap(),
    );
    response
}

/// Start a distributor on an ephemeral port, sending pod traffic to `backend_port`.
pub async fn start_distributor(store: &MemoryStore, backend_port: u16) -> (SocketAddr, Shutdown) {
    let mut config = DistributorConfig::default();
    config.backend.port = backend_port;
    config.timeouts.connect_secs = 2;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, Arc::new(store.clone()));
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

/// Write a live heartbeat for `pod`.
pub async fn register_pod(store: &MemoryStore, pod: &str) {
    store
        .set_with_ttl(&format!("pod-registry:{pod}"), "1", Duration::from_secs(30))
        .await
        .unwrap();
}

/// Force the connection count of `pod`.
pub async fn set_connections(store: &MemoryStore, pod: &str, count: i64) {
    store
        .set_with_ttl(
            &format!("connection-count:{pod}"),
            &count.to_string(),
            Duration::from_secs(3600),
        )
        .await
        .unwrap();
}

/// A port nothing listens on.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Poll `key` until it holds `expected`, failing after a few seconds.
pub async fn wait_for_value(store: &MemoryStore, key: &str, expected: Option<&str>) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let value = store.get(key).await.unwrap();
        if value.as_deref() == expected {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "{key} stayed at {value:?}, expected {expected:?}"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
