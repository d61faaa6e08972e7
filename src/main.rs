//! Session distributor.
//!
//! ```text
//!                       ┌──────────────────────────────────────────────┐
//!                       │                DISTRIBUTOR                   │
//!   Client request      │  ┌────────┐   ┌──────────┐   ┌────────────┐  │
//!   ────────────────────┼─▶│  http  │──▶│ routing  │──▶│ affinity   │  │
//!                       │  │ server │   │ matcher  │   │ resolver   │  │
//!                       │  └────────┘   └──────────┘   └─────┬──────┘  │
//!                       │                                    │ miss    │
//!                       │                                    ▼         │
//!                       │                             ┌────────────┐   │
//!                       │                             │ least-conn │   │
//!                       │                             │  registry  │   │
//!                       │                             └─────┬──────┘   │
//!                       │            ┌──────────────────────┴───┐      │
//!                       │            ▼                          ▼      │
//!                       │     ┌────────────┐            ┌────────────┐ │      ┌─────┐
//!   ◀───────────────────┼─────│  tunnel    │◀──────────▶│  proxy     │─┼─────▶│ Pod │
//!                       │     │ (ws relay) │            │ (http fwd) │ │      └─────┘
//!                       │     └────────────┘            └────────────┘ │
//!                       └──────────────────┬───────────────────────────┘
//!                                          ▼
//!                              coordination store (Redis)
//! ```

use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use session_distributor::config::loader::{finish_distributor, load_distributor};
use session_distributor::observability::{logging, metrics};
use session_distributor::store::{CoordinationStore, RedisStore};
use session_distributor::{HttpServer, Shutdown};

#[derive(Debug, Parser)]
#[command(name = "session-distributor")]
#[command(about = "Session-affinity load balancer for document-collaboration pods", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "DISTRIBUTOR_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on, all interfaces.
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Coordination store `host:port`.
    #[arg(long, env = "REDIS_ADDR")]
    store_address: Option<String>,

    /// Coordination store password.
    #[arg(long, env = "REDIS_PASS", hide_env_values = true)]
    store_password: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let mut config = load_distributor(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.listener.bind_address = format!("0.0.0.0:{port}");
    }
    if let Some(address) = cli.store_address {
        config.store.address = address;
    }
    if let Some(password) = cli.store_password.filter(|p| !p.is_empty()) {
        config.store.password = Some(password);
    }
    config.observability.json_logs |= cli.json_logs;
    let config = finish_distributor(config)?;

    logging::init_logging(
        "session_distributor=debug,tower_http=debug",
        config.observability.json_logs,
    );
    tracing::info!("session-distributor v{} starting", env!("CARGO_PKG_VERSION"));

    let store = RedisStore::connect(&config.store).await.inspect_err(|e| {
        tracing::error!(address = %config.store.address, error = %e, "Failed to connect to coordination store");
    })?;
    store.ping().await.inspect_err(|e| {
        tracing::error!(address = %config.store.address, error = %e, "Coordination store did not answer PING");
    })?;
    tracing::info!(address = %config.store.address, "Connected to coordination store");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        affinity_ttl_secs = config.affinity.ttl_secs,
        renewal_interval_secs = config.affinity.renewal_interval_secs,
        "Listening for connections"
    );

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let server = HttpServer::new(config, Arc::new(store));
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
