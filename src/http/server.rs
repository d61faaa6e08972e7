//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the catch-all distribution handler
//! - Wire up middleware (timeout, tracing, request ID)
//! - Build the shared state: placement, counters, pod HTTP client
//! - Bind server to listener and drain on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::DistributorConfig;
use crate::http::request::{propagate_request_id, request_span, set_request_id};
use crate::http::websocket::TunnelSettings;
use crate::http::{proxy, websocket};
use crate::lifecycle::shutdown;
use crate::load_balancer::{ConnectionCounter, PodRegistry};
use crate::routing::{AffinityResolver, RequestKind, SessionExtractor, SessionRouter, TunnelMatcher};
use crate::store::SharedStore;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<SessionRouter>,
    pub counter: ConnectionCounter,
    pub client: Client<HttpConnector, Body>,
    pub matcher: TunnelMatcher,
    pub sessions: SessionExtractor,
    pub tunnel: Arc<TunnelSettings>,
    pub backend_port: u16,
    pub max_form_body_bytes: usize,
}

impl AppState {
    pub fn new(config: &DistributorConfig, store: SharedStore) -> Self {
        let counter = ConnectionCounter::new(store.clone(), config.connections.ttl());
        let resolver = AffinityResolver::new(store.clone(), config.affinity.ttl());
        let registry = PodRegistry::new(store, counter.clone());
        let connect_timeout = Duration::from_secs(config.timeouts.connect_secs);

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            router: Arc::new(SessionRouter::new(resolver, registry)),
            counter,
            client,
            matcher: TunnelMatcher::new(config.routing.tunnel_prefix.clone()),
            sessions: SessionExtractor::new(config.routing.session_param.clone()),
            tunnel: Arc::new(TunnelSettings {
                backend_port: config.backend.port,
                host: config.backend.tunnel_host.clone(),
                origin: config.backend.tunnel_origin.clone(),
                connect_timeout,
                renewal_interval: config.affinity.renewal_interval(),
            }),
            backend_port: config.backend.port,
            max_form_body_bytes: config.routing.max_form_body_bytes,
        }
    }
}

/// HTTP front of the distributor.
pub struct HttpServer {
    router: Router,
    config: DistributorConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration and store.
    pub fn new(config: DistributorConfig, store: SharedStore) -> Self {
        let state = AppState::new(&config, store);
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &DistributorConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(distribute))
            .route("/", any(distribute))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id())
                    .layer(TraceLayer::new_for_http().make_span_with(request_span))
                    .layer(propagate_request_id())
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
            )
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            tunnel_prefix = %self.config.routing.tunnel_prefix,
            backend_port = self.config.backend.port,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all handler: tunnel requests are relayed, everything else forwarded.
async fn distribute(State(state): State<AppState>, request: Request<Body>) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let result = match state.matcher.classify(request.uri().path()) {
        RequestKind::Tunnel => websocket::handle(state, request).await,
        RequestKind::Plain => proxy::forward(state, peer, request).await,
    };

    result.unwrap_or_else(IntoResponse::into_response)
}
