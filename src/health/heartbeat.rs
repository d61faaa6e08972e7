//! Pod heartbeat agent.
//!
//! # Responsibilities
//! - Register this pod in the coordination store at startup
//! - Periodically rewrite the heartbeat so the record outlives its TTL
//! - Remove the record on shutdown
//!
//! A missed refresh is not retried before the next tick; if refreshes keep
//! failing the record expires and the pod stops receiving new sessions.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::HeartbeatConfig;
use crate::load_balancer::PodAddr;
use crate::observability::metrics;
use crate::store::{keys, SharedStore, StoreError};

/// Value stored in a heartbeat record; only its presence matters.
const PRESENCE: &str = "1";

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("failed to register pod {pod}: {source}")]
    Registration {
        pod: PodAddr,
        #[source]
        source: StoreError,
    },
}

/// Keeps `pod-registry:<pod>` alive while the pod runs.
#[derive(Debug)]
pub struct HeartbeatAgent {
    store: SharedStore,
    pod: PodAddr,
    key: String,
    ttl: Duration,
    interval: Duration,
}

impl HeartbeatAgent {
    pub fn new(store: SharedStore, pod: PodAddr, config: &HeartbeatConfig) -> Self {
        let key = keys::pod_registry(pod.as_str());
        Self {
            store,
            pod,
            key,
            ttl: config.ttl(),
            interval: config.interval(),
        }
    }

    /// Write the initial heartbeat. Failure means the pod cannot be discovered.
    pub async fn register(&self) -> Result<(), AgentError> {
        self.store
            .set_with_ttl(&self.key, PRESENCE, self.ttl)
            .await
            .map_err(|source| AgentError::Registration {
                pod: self.pod.clone(),
                source,
            })?;
        metrics::record_heartbeat(true);
        tracing::info!(key = %self.key, ttl_secs = self.ttl.as_secs(), "Registered pod");
        Ok(())
    }

    /// Rewrite the heartbeat. Failures are logged only.
    pub async fn refresh(&self) -> bool {
        match self.store.set_with_ttl(&self.key, PRESENCE, self.ttl).await {
            Ok(()) => {
                metrics::record_heartbeat(true);
                tracing::trace!(key = %self.key, "Heartbeat refreshed");
                true
            }
            Err(e) => {
                metrics::record_heartbeat(false);
                tracing::warn!(key = %self.key, error = %e, "Heartbeat refresh failed");
                false
            }
        }
    }

    /// Best-effort removal of the heartbeat.
    pub async fn deregister(&self) {
        tracing::info!(key = %self.key, "Deregistering pod");
        match self.store.delete(&self.key).await {
            Ok(()) => tracing::info!(key = %self.key, "Deregistered successfully"),
            Err(e) => tracing::error!(key = %self.key, error = %e, "Failed to deregister"),
        }
    }

    /// Register, refresh until shutdown, then deregister.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), AgentError> {
        self.register().await?;

        tracing::info!(
            pod = %self.pod,
            interval_secs = self.interval.as_secs(),
            "Heartbeat loop starting"
        );

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.refresh().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Heartbeat loop received shutdown signal");
                    break;
                }
            }
        }

        self.deregister().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use crate::store::{CoordinationStore, MemoryStore};
    use async_trait::async_trait;
    use std::sync::Arc;

    const KEY: &str = "pod-registry:10.0.0.8";

    fn agent(store: SharedStore) -> HeartbeatAgent {
        let config = HeartbeatConfig {
            ttl_secs: 30,
            interval_secs: 10,
        };
        HeartbeatAgent::new(store, PodAddr::parse("10.0.0.8").unwrap(), &config)
    }

    #[derive(Debug)]
    struct DownStore;

    #[async_trait]
    impl CoordinationStore for DownStore {
        async fn ping(&self) -> Result<(), StoreError> {
            Err(StoreError::Connection("down".into()))
        }
        async fn get(&self, _: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Connection("down".into()))
        }
        async fn set_with_ttl(&self, _: &str, _: &str, _: Duration) -> Result<(), StoreError> {
            Err(StoreError::Connection("down".into()))
        }
        async fn expire(&self, _: &str, _: Duration) -> Result<bool, StoreError> {
            Err(StoreError::Connection("down".into()))
        }
        async fn delete(&self, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Connection("down".into()))
        }
        async fn incr(&self, _: &str) -> Result<i64, StoreError> {
            Err(StoreError::Connection("down".into()))
        }
        async fn decr(&self, _: &str) -> Result<i64, StoreError> {
            Err(StoreError::Connection("down".into()))
        }
        async fn scan_prefix(&self, _: &str) -> Result<Vec<String>, StoreError> {
            Err(StoreError::Connection("down".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle() {
        let store = MemoryStore::new();
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(agent(Arc::new(store.clone())).run(shutdown.subscribe()));

        time::sleep(Duration::from_secs(1)).await;
        let ttl = store.ttl(KEY).unwrap();
        assert!(ttl > Duration::from_secs(28) && ttl < Duration::from_secs(30));

        // refreshed at t=10, so at t=11 the record has ~29s left instead of 19s
        time::sleep(Duration::from_secs(10)).await;
        assert!(store.ttl(KEY).unwrap() > Duration::from_secs(20));

        shutdown.trigger();
        handle.await.unwrap().unwrap();
        assert_eq!(store.get(KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_registration_failure_is_fatal() {
        let result = agent(Arc::new(DownStore)).run(Shutdown::new().subscribe()).await;
        assert!(matches!(result, Err(AgentError::Registration { .. })));
    }

    #[tokio::test]
    async fn test_refresh_and_deregister_failures_tolerated() {
        let agent = agent(Arc::new(DownStore));
        assert!(!agent.refresh().await);
        agent.deregister().await;
    }
}
