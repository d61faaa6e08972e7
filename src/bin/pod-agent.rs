//! Per-pod heartbeat agent.
//!
//! Runs next to a pod and keeps `pod-registry:<POD_IP>` alive in the
//! coordination store until the process is told to stop.

use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use session_distributor::config::loader::{finish_agent, load_agent};
use session_distributor::health::HeartbeatAgent;
use session_distributor::load_balancer::PodAddr;
use session_distributor::observability::{logging, metrics};
use session_distributor::store::RedisStore;
use session_distributor::Shutdown;

#[derive(Debug, Parser)]
#[command(name = "pod-agent")]
#[command(about = "Registers this pod with the session distributor", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "POD_AGENT_CONFIG")]
    config: Option<PathBuf>,

    /// Address the distributor uses to reach this pod.
    #[arg(long, env = "POD_IP")]
    pod_address: Option<String>,

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

    let mut config = load_agent(cli.config.as_deref())?;
    if let Some(pod) = cli.pod_address {
        config.pod_address = pod;
    }
    if let Some(address) = cli.store_address {
        config.store.address = address;
    }
    if let Some(password) = cli.store_password.filter(|p| !p.is_empty()) {
        config.store.password = Some(password);
    }
    config.observability.json_logs |= cli.json_logs;
    let config = finish_agent(config)?;

    logging::init_logging("session_distributor=info,pod_agent=info", config.observability.json_logs);

    // validated by finish_agent
    let pod = PodAddr::parse(&config.pod_address)
        .ok_or_else(|| format!("invalid pod address {:?}", config.pod_address))?;
    tracing::info!(pod = %pod, "pod-agent v{} starting", env!("CARGO_PKG_VERSION"));

    let store = RedisStore::connect(&config.store).await.inspect_err(|e| {
        tracing::error!(address = %config.store.address, error = %e, "Failed to connect to coordination store");
    })?;

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let agent = HeartbeatAgent::new(Arc::new(store), pod, &config.heartbeat);
    agent.run(shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
