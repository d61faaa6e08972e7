//! Per-pod live connection accounting.
//!
//! # Responsibilities
//! - Count established tunnels per pod in the shared store
//! - Keep a safety TTL on the counter so a crashed distributor cannot leak
//!   counts forever
//!
//! # Design Decisions
//! - Counts are best effort; a mismatched decrement may go negative and the
//!   balancer clamps negatives to zero when comparing
//! - Failures are logged and reported, never retried

use std::time::Duration;

use crate::load_balancer::PodAddr;
use crate::observability::metrics;
use crate::store::{keys, SharedStore, StoreError};

/// Increments and decrements `connection-count:<pod>`.
#[derive(Debug, Clone)]
pub struct ConnectionCounter {
    store: SharedStore,
    ttl: Duration,
}

impl ConnectionCounter {
    pub fn new(store: SharedStore, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Record a newly established tunnel to `pod`.
    pub async fn increment(&self, pod: &PodAddr) -> Result<i64, StoreError> {
        let key = keys::connection_count(pod.as_str());
        let count = self.store.incr(&key).await.inspect_err(|e| {
            tracing::error!(pod = %pod, error = %e, "Failed to increment connection count");
            metrics::record_store_error("incr");
        })?;

        if let Err(e) = self.store.expire(&key, self.ttl).await {
            tracing::warn!(pod = %pod, error = %e, "Failed to refresh connection count TTL");
            metrics::record_store_error("expire");
        }

        tracing::debug!(pod = %pod, count, "Connection count increased");
        Ok(count)
    }

    /// Record a terminated tunnel to `pod`.
    pub async fn decrement(&self, pod: &PodAddr) -> Result<i64, StoreError> {
        let key = keys::connection_count(pod.as_str());
        let count = self.store.decr(&key).await.inspect_err(|e| {
            tracing::error!(pod = %pod, error = %e, "Failed to decrement connection count");
            metrics::record_store_error("decr");
        })?;

        tracing::debug!(pod = %pod, count, "Connection count decreased");
        Ok(count)
    }

    /// Current count for `pod`; a missing or unreadable counter counts as 0.
    pub async fn count(&self, pod: &PodAddr) -> Result<i64, StoreError> {
        let value = self.store.get(&keys::connection_count(pod.as_str())).await?;
        Ok(value.and_then(|v| v.trim().parse().ok()).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_increment_sets_safety_ttl() {
        let store = MemoryStore::new();
        let counter = ConnectionCounter::new(Arc::new(store.clone()), Duration::from_secs(60));
        let pod = PodAddr::parse("10.0.0.1").unwrap();

        assert_eq!(counter.increment(&pod).await.unwrap(), 1);
        assert_eq!(counter.increment(&pod).await.unwrap(), 2);
        assert_eq!(store.ttl("connection-count:10.0.0.1"), Some(Duration::from_secs(60)));

        assert_eq!(counter.decrement(&pod).await.unwrap(), 1);
        assert_eq!(counter.count(&pod).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_counter_is_zero() {
        let counter = ConnectionCounter::new(Arc::new(MemoryStore::new()), Duration::from_secs(60));
        let pod = PodAddr::parse("10.0.0.2").unwrap();
        assert_eq!(counter.count(&pod).await.unwrap(), 0);
    }
}
