//! Session affinity mappings.
//!
//! # Responsibilities
//! - Look up which pod serves a session
//! - Record the pod chosen for a new session
//! - Push the mapping's expiry back to the full window on every access
//!
//! # Design Decisions
//! - Anonymous requests (empty identifier) are never tracked
//! - Read and renewal failures degrade to "unmapped" / "not renewed" and are
//!   only logged; write failures are returned to the caller
//! - Mappings are removed by expiry only

use std::time::Duration;

use crate::load_balancer::PodAddr;
use crate::observability::metrics;
use crate::store::{keys, SharedStore, StoreError};

/// Resolves and maintains `session-affinity:<session>` records.
#[derive(Debug, Clone)]
pub struct AffinityResolver {
    store: SharedStore,
    ttl: Duration,
}

impl AffinityResolver {
    pub fn new(store: SharedStore, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Pod currently bound to `session`, if any.
    pub async fn resolve(&self, session: &str) -> Option<PodAddr> {
        if session.is_empty() {
            return None;
        }

        let value = match self.store.get(&keys::session_affinity(session)).await {
            Ok(value) => value?,
            Err(e) => {
                tracing::warn!(session = %session, error = %e, "Failed to read affinity mapping");
                metrics::record_store_error("get");
                return None;
            }
        };

        let pod = PodAddr::parse(&value);
        if pod.is_none() {
            tracing::warn!(session = %session, value = %value, "Ignoring affinity mapping with invalid pod address");
        }
        pod
    }

    /// Bind `session` to `pod` for the affinity window. No-op for an empty session.
    pub async fn register(&self, session: &str, pod: &PodAddr) -> Result<(), StoreError> {
        if session.is_empty() {
            return Ok(());
        }
        self.store
            .set_with_ttl(&keys::session_affinity(session), pod.as_str(), self.ttl)
            .await
    }

    /// Reset the mapping's expiry to the full window. Returns whether it was renewed.
    pub async fn renew(&self, session: &str) -> bool {
        if session.is_empty() {
            return false;
        }

        match self.store.expire(&keys::session_affinity(session), self.ttl).await {
            Ok(renewed) => {
                if !renewed {
                    tracing::debug!(session = %session, "Affinity mapping vanished before renewal");
                }
                renewed
            }
            Err(e) => {
                tracing::warn!(session = %session, error = %e, "Failed to renew affinity mapping");
                metrics::record_store_error("expire");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CoordinationStore, MemoryStore};
    use std::sync::Arc;

    const WINDOW: Duration = Duration::from_secs(3600);

    fn resolver() -> (MemoryStore, AffinityResolver) {
        let store = MemoryStore::new();
        let resolver = AffinityResolver::new(Arc::new(store.clone()), WINDOW);
        (store, resolver)
    }

    #[tokio::test]
    async fn test_register_then_resolve() {
        let (store, resolver) = resolver();
        let pod = PodAddr::parse("10.0.0.1").unwrap();

        resolver.register("S1", &pod).await.unwrap();
        assert_eq!(
            store.get("session-affinity:S1").await.unwrap().as_deref(),
            Some("10.0.0.1")
        );
        assert_eq!(resolver.resolve("S1").await, Some(pod.clone()));
        assert_eq!(resolver.resolve("S1").await, Some(pod));
    }

    #[tokio::test]
    async fn test_empty_session_untracked() {
        let (store, resolver) = resolver();
        let pod = PodAddr::parse("10.0.0.1").unwrap();

        resolver.register("", &pod).await.unwrap();
        assert!(store.is_empty());
        assert_eq!(resolver.resolve("").await, None);
        assert!(!resolver.renew("").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_renew_restores_full_window() {
        let (store, resolver) = resolver();
        resolver.register("S1", &PodAddr::parse("10.0.0.1").unwrap()).await.unwrap();

        tokio::time::advance(Duration::from_secs(3000)).await;
        assert!(store.ttl("session-affinity:S1").unwrap() <= Duration::from_secs(600));

        assert!(resolver.renew("S1").await);
        assert_eq!(store.ttl("session-affinity:S1"), Some(WINDOW));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_mapping_expires() {
        let (_, resolver) = resolver();
        resolver.register("S1", &PodAddr::parse("10.0.0.1").unwrap()).await.unwrap();

        tokio::time::advance(WINDOW + Duration::from_secs(1)).await;
        assert_eq!(resolver.resolve("S1").await, None);
        assert!(!resolver.renew("S1").await);
    }

    #[tokio::test]
    async fn test_invalid_stored_value_is_unmapped() {
        let (store, resolver) = resolver();
        store.set_with_ttl("session-affinity:S1", "not a host", WINDOW).await.unwrap();
        assert_eq!(resolver.resolve("S1").await, None);
    }
}
