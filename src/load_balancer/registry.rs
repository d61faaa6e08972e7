//! Live pod discovery and placement.
//!
//! # Responsibilities
//! - Enumerate heartbeat records to find live pods
//! - Read each pod's connection count
//! - Apply the load balancing strategy to pick a pod

use futures_util::future::join_all;

use crate::error::DistributorError;
use crate::load_balancer::{
    counter::ConnectionCounter, least_conn::LeastConnections, LoadBalancer, PodAddr, PodLoad,
};
use crate::observability::metrics;
use crate::store::{keys, SharedStore};

/// Picks pods among those with a live heartbeat.
#[derive(Debug)]
pub struct PodRegistry {
    store: SharedStore,
    counter: ConnectionCounter,
    strategy: Box<dyn LoadBalancer>,
}

impl PodRegistry {
    /// Registry using least-connections placement.
    pub fn new(store: SharedStore, counter: ConnectionCounter) -> Self {
        Self {
            store,
            counter,
            strategy: Box::new(LeastConnections::new()),
        }
    }

    /// Pods with a live heartbeat, sorted by address.
    pub async fn live_pods(&self) -> Result<Vec<PodAddr>, DistributorError> {
        let entries = self
            .store
            .scan_prefix(keys::POD_REGISTRY_PREFIX)
            .await
            .inspect_err(|e| {
                tracing::error!(error = %e, "Failed to enumerate pod registry");
                metrics::record_store_error("scan");
            })?;

        let mut pods: Vec<PodAddr> = entries
            .iter()
            .filter_map(|key| {
                let pod = keys::pod_from_registry_key(key).and_then(PodAddr::parse);
                if pod.is_none() {
                    tracing::warn!(key = %key, "Ignoring registry key with invalid pod address");
                }
                pod
            })
            .collect();
        pods.sort();
        pods.dedup();
        Ok(pods)
    }

    /// Choose a pod for a session with no affinity.
    pub async fn select_pod(&self) -> Result<PodAddr, DistributorError> {
        let pods = self.live_pods().await?;
        if pods.is_empty() {
            tracing::warn!("Pod registry is empty");
            return Err(DistributorError::NoAvailablePods);
        }

        let loads: Vec<PodLoad> = join_all(pods.into_iter().map(|addr| async move {
            let connections = match self.counter.count(&addr).await {
                Ok(count) => count,
                Err(e) => {
                    tracing::warn!(pod = %addr, error = %e, "Failed to read connection count, assuming 0");
                    metrics::record_store_error("get");
                    0
                }
            };
            PodLoad { addr, connections }
        }))
        .await;

        for load in &loads {
            tracing::debug!(pod = %load.addr, connections = load.connections, "Pod candidate");
        }

        self.strategy
            .next_pod(&loads)
            .ok_or(DistributorError::NoAvailablePods)
    }
}
