//! Key layout in the coordination store.
//!
//! The three namespaces are disjoint: no prefix is a prefix of another, so a
//! scan over heartbeat keys never returns counter or affinity keys.

/// Heartbeat records written by each pod agent.
pub const POD_REGISTRY_PREFIX: &str = "pod-registry:";

/// Live tunnel counts per pod.
pub const CONNECTION_COUNT_PREFIX: &str = "connection-count:";

/// Session → pod affinity mappings.
pub const SESSION_AFFINITY_PREFIX: &str = "session-affinity:";

/// Heartbeat key for a pod address.
pub fn pod_registry(pod: &str) -> String {
    format!("{POD_REGISTRY_PREFIX}{pod}")
}

/// Connection counter key for a pod address.
pub fn connection_count(pod: &str) -> String {
    format!("{CONNECTION_COUNT_PREFIX}{pod}")
}

/// Affinity key for a session identifier.
pub fn session_affinity(session: &str) -> String {
    format!("{SESSION_AFFINITY_PREFIX}{session}")
}

/// Extract the pod address from a heartbeat key.
///
/// Strips the prefix instead of splitting on `:` so IPv6 addresses survive.
pub fn pod_from_registry_key(key: &str) -> Option<&str> {
    key.strip_prefix(POD_REGISTRY_PREFIX).filter(|pod| !pod.is_empty())
}
