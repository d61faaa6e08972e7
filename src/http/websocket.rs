//! WebSocket tunnel to the pod serving a session.
//!
//! # Responsibilities
//! - Place the session (affinity or least connections)
//! - Open a WebSocket connection to the pod with its expected Host/Origin
//! - Complete the upgrade handshake with the client
//! - Relay frames in both directions until either side ends
//! - Keep the affinity mapping alive while the tunnel is open
//!
//! # Data Flow
//! ```text
//! Client ←──── WebSocket frames ────→ Distributor ←──── WebSocket frames ────→ Pod
//!                                          │
//!                            connection-count:<pod> INCR … DECR
//!                            session-affinity:<id> PEXPIRE every renewal interval
//! ```
//!
//! # Design Decisions
//! - The pod is dialed before the client upgrade completes, so a dial failure
//!   is reported as 502 instead of an immediately closed socket
//! - Frame-level forwarding, payloads untouched (no message buffering)
//! - Close frames propagated in both directions
//! - Ping/pong answered per hop by the WebSocket implementations
//! - The first relay direction to end cancels the other; both are joined
//!   before the single counter decrement

use std::fmt::Display;
use std::time::{Duration, Instant};

use axum::{
    body::{Body, Bytes},
    extract::{
        ws::{self, WebSocket, WebSocketUpgrade},
        FromRequestParts,
    },
    http::Request,
    response::Response,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        self,
        client::IntoClientRequest,
        http::{header, HeaderValue},
        protocol::{frame::coding::CloseCode, CloseFrame},
    },
    MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;

use crate::error::DistributorError;
use crate::http::server::AppState;
use crate::load_balancer::{ConnectionCounter, PodAddr};
use crate::observability::metrics;
use crate::routing::AffinityResolver;

type PodSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on flushing a close frame to a peer that stopped reading.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// How tunnels reach pods.
#[derive(Debug, Clone)]
pub struct TunnelSettings {
    pub backend_port: u16,
    pub host: String,
    pub origin: String,
    pub connect_timeout: Duration,
    pub renewal_interval: Duration,
}

/// Handle a request classified as a tunnel request.
pub async fn handle(state: AppState, request: Request<Body>) -> Result<Response, DistributorError> {
    let (mut parts, _body) = request.into_parts();

    let session = state
        .sessions
        .from_query(parts.uri.query())
        .ok_or_else(|| DistributorError::MissingSession(state.sessions.param().to_string()))?;

    let upgrade = WebSocketUpgrade::from_request_parts(&mut parts, &state)
        .await
        .map_err(|rejection| DistributorError::UpgradeFailure(rejection.body_text()))?;

    let placement = state.router.place(&session).await?;
    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let pod_socket = dial(&state.tunnel, &placement.pod, path).await.inspect_err(|e| {
        tracing::error!(error = %e, "Tunnel dial failed");
        metrics::record_tunnel_failed();
    })?;

    let tunnel = Tunnel {
        session,
        pod: placement.pod,
        resolver: state.router.resolver().clone(),
        counter: state.counter.clone(),
        renewal_interval: state.tunnel.renewal_interval,
    };

    Ok(upgrade
        .on_failed_upgrade(|e| {
            tracing::warn!(error = %e, "Client WebSocket upgrade failed, dropping pod connection");
            metrics::record_tunnel_failed();
        })
        .on_upgrade(move |client| tunnel.run(client, pod_socket)))
}

/// Open the WebSocket connection to `pod`, forwarding the original path and query.
pub async fn dial(
    settings: &TunnelSettings,
    pod: &PodAddr,
    path_and_query: &str,
) -> Result<PodSocket, DistributorError> {
    let failure = |reason: String| DistributorError::TunnelDialFailure {
        pod: pod.clone(),
        reason,
    };

    let url = format!("ws://{}{}", pod.authority(settings.backend_port), path_and_query);
    tracing::debug!(url = %url, "Connecting to pod WebSocket");

    let mut request = url
        .into_client_request()
        .map_err(|e| failure(e.to_string()))?;
    let host = HeaderValue::from_str(&settings.host).map_err(|e| failure(e.to_string()))?;
    let origin = HeaderValue::from_str(&settings.origin).map_err(|e| failure(e.to_string()))?;
    request.headers_mut().insert(header::HOST, host);
    request.headers_mut().insert(header::ORIGIN, origin);

    let (socket, _response) = time::timeout(settings.connect_timeout, connect_async(request))
        .await
        .map_err(|_| failure(format!("timed out after {:?}", settings.connect_timeout)))?
        .map_err(|e| failure(e.to_string()))?;

    Ok(socket)
}

/// An established session between a client and its pod.
#[derive(Debug)]
pub struct Tunnel {
    session: String,
    pod: PodAddr,
    resolver: AffinityResolver,
    counter: ConnectionCounter,
    renewal_interval: Duration,
}

impl Tunnel {
    /// Relay until either side ends, then tear down exactly once.
    pub async fn run(self, client: WebSocket, pod_socket: PodSocket) {
        let started = Instant::now();
        let counted = self.counter.increment(&self.pod).await.is_ok();
        metrics::record_tunnel_opened();
        tracing::info!(session = %self.session, pod = %self.pod, "Tunnel open");

        let cancel = CancellationToken::new();
        let (client_tx, client_rx) = client.split();
        let (pod_tx, pod_rx) = pod_socket.split();

        let upstream = tokio::spawn(relay(
            "client->pod",
            client_rx,
            pod_tx,
            client_to_pod,
            cancel.clone(),
        ));
        let downstream = tokio::spawn(relay(
            "pod->client",
            pod_rx,
            client_tx,
            pod_to_client,
            cancel.clone(),
        ));
        let renewal = tokio::spawn(renew_periodically(
            self.resolver.clone(),
            self.session.clone(),
            self.renewal_interval,
            cancel.clone(),
        ));

        let (up, down) = tokio::join!(upstream, downstream);
        cancel.cancel();
        for result in [up, down, renewal.await] {
            if let Err(e) = result {
                tracing::error!(session = %self.session, error = %e, "Tunnel task failed");
            }
        }

        if counted {
            let _ = self.counter.decrement(&self.pod).await;
        }
        metrics::record_tunnel_closed(started.elapsed());
        tracing::info!(
            session = %self.session,
            pod = %self.pod,
            duration_secs = started.elapsed().as_secs(),
            "Tunnel closed"
        );
    }
}

/// Copy frames from `source` to `sink` until end of stream, error, close frame
/// or cancellation, then close `sink`. Cancels `cancel` on exit, including
/// when the task unwinds.
async fn relay<In, Out, RxErr, TxErr>(
    direction: &'static str,
    mut source: impl Stream<Item = Result<In, RxErr>> + Unpin,
    mut sink: impl Sink<Out, Error = TxErr> + Unpin,
    convert: fn(In) -> Relayed<Out>,
    cancel: CancellationToken,
) where
    RxErr: Display,
    TxErr: Display,
{
    let _guard = cancel.clone().drop_guard();

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = source.next() => next,
        };

        let message = match next {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                tracing::debug!(direction, error = %e, "Relay read ended");
                break;
            }
            None => break,
        };

        match convert(message) {
            Relayed::Forward(out) => {
                // a peer that stopped reading must not block teardown
                let sent = tokio::select! {
                    _ = cancel.cancelled() => break,
                    sent = sink.send(out) => sent,
                };
                if let Err(e) = sent {
                    tracing::debug!(direction, error = %e, "Relay write ended");
                    break;
                }
            }
            Relayed::Close(out) => {
                let _ = time::timeout(CLOSE_GRACE, sink.send(out)).await;
                break;
            }
            Relayed::Skip => {}
        }
    }

    let _ = time::timeout(CLOSE_GRACE, sink.close()).await;
}

async fn renew_periodically(
    resolver: AffinityResolver,
    session: String,
    every: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = time::interval_at(time::Instant::now() + every, every);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if resolver.renew(&session).await {
                    tracing::debug!(session = %session, "Renewed affinity mapping");
                }
            }
        }
    }
}

/// What to do with one received frame.
enum Relayed<T> {
    Forward(T),
    Close(T),
    Skip,
}

fn client_to_pod(message: ws::Message) -> Relayed<tungstenite::Message> {
    match message {
        ws::Message::Text(text) => match text_to_pod(text) {
            Some(text) => Relayed::Forward(tungstenite::Message::Text(text)),
            None => Relayed::Skip,
        },
        ws::Message::Binary(data) => Relayed::Forward(tungstenite::Message::Binary(data)),
        ws::Message::Ping(_) | ws::Message::Pong(_) => Relayed::Skip,
        ws::Message::Close(frame) => Relayed::Close(tungstenite::Message::Close(frame.map(|f| {
            CloseFrame {
                code: CloseCode::from(f.code),
                reason: text_to_pod(f.reason).unwrap_or_default(),
            }
        }))),
    }
}

fn pod_to_client(message: tungstenite::Message) -> Relayed<ws::Message> {
    match message {
        tungstenite::Message::Text(text) => match text_to_client(text) {
            Some(text) => Relayed::Forward(ws::Message::Text(text)),
            None => Relayed::Skip,
        },
        tungstenite::Message::Binary(data) => Relayed::Forward(ws::Message::Binary(data)),
        tungstenite::Message::Ping(_)
        | tungstenite::Message::Pong(_)
        | tungstenite::Message::Frame(_) => Relayed::Skip,
        tungstenite::Message::Close(frame) => Relayed::Close(ws::Message::Close(frame.map(|f| {
            ws::CloseFrame {
                code: u16::from(f.code),
                reason: text_to_client(f.reason).unwrap_or_default(),
            }
        }))),
    }
}

// Both sides wrap the same `Bytes`; the UTF-8 check never fails and copies nothing.
fn text_to_pod(text: ws::Utf8Bytes) -> Option<tungstenite::Utf8Bytes> {
    tungstenite::Utf8Bytes::try_from(Bytes::from(text)).ok()
}

fn text_to_client(text: tungstenite::Utf8Bytes) -> Option<ws::Utf8Bytes> {
    ws::Utf8Bytes::try_from(Bytes::from(text)).ok()
}
