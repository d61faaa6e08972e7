//! Configuration schema definitions.
//!
//! Two roots share the store section: `DistributorConfig` for the balancer and
//! `AgentConfig` for the per-pod heartbeat agent. All types derive Serde traits
//! for deserialization from TOML files; every field has a default.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the distributor.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DistributorConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Coordination store connection.
    pub store: StoreConfig,

    /// Session affinity windows.
    pub affinity: AffinityConfig,

    /// Connection counter settings.
    pub connections: ConnectionCountConfig,

    /// Backend pod contract.
    pub backend: BackendConfig,

    /// Request routing settings.
    pub routing: RoutingConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Coordination store connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// `host:port` of the Redis/KeyDB server.
    pub address: String,

    /// Optional password.
    pub password: Option<String>,

    /// Logical database index.
    pub database: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:6379".to_string(),
            password: None,
            database: 0,
        }
    }
}

/// Session affinity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AffinityConfig {
    /// Lifetime of a session → pod mapping since its last access, in seconds.
    pub ttl_secs: u64,

    /// How often an open tunnel renews its mapping, in seconds.
    pub renewal_interval_secs: u64,
}

impl AffinityConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn renewal_interval(&self) -> Duration {
        Duration::from_secs(self.renewal_interval_secs)
    }
}

impl Default for AffinityConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 30 * 60 * 60,
            renewal_interval_secs: 15 * 60 * 60,
        }
    }
}

/// Connection counter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionCountConfig {
    /// Safety expiry for a pod's counter, refreshed on every increment.
    pub ttl_secs: u64,
}

impl ConnectionCountConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for ConnectionCountConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 30 * 60 * 60,
        }
    }
}

/// How pods are reached.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Port every pod serves HTTP and WebSocket traffic on.
    pub port: u16,

    /// `Host` header sent when opening a pod tunnel.
    pub tunnel_host: String,

    /// `Origin` header sent when opening a pod tunnel.
    pub tunnel_origin: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            port: 9980,
            tunnel_host: "collabora.local".to_string(),
            tunnel_origin: "http://collabora.local".to_string(),
        }
    }
}

/// Request classification settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Name of the query/form parameter carrying the session identifier.
    pub session_param: String,

    /// Path prefix of tunnel requests; the path must also end in `/ws`.
    pub tunnel_prefix: String,

    /// Largest form body buffered to look for the session parameter.
    pub max_form_body_bytes: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            session_param: "WOPISrc".to_string(),
            tunnel_prefix: "/cool/".to_string(),
            max_form_body_bytes: 1024 * 1024,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Pod connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Plain request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 300,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Expose Prometheus metrics.
    pub metrics_enabled: bool,

    /// Address for the metrics listener.
    pub metrics_address: String,

    /// Emit JSON log lines instead of human-readable ones.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
            json_logs: false,
        }
    }
}

/// Root configuration for the pod agent.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AgentConfig {
    /// Coordination store connection.
    pub store: StoreConfig,

    /// Address this pod is reachable at (usually the pod IP).
    pub pod_address: String,

    /// Heartbeat timing.
    pub heartbeat: HeartbeatConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Heartbeat timing for the pod agent.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// Lifetime of the heartbeat record in seconds.
    pub ttl_secs: u64,

    /// Refresh period in seconds; must be shorter than the TTL.
    pub interval_secs: u64,
}

impl HeartbeatConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 30,
            interval_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: DistributorConfig = toml::from_str(
            r#"
            [store]
            address = "keydb:6379"

            [affinity]
            ttl_secs = 120
            "#,
        )
        .unwrap();

        assert_eq!(config.store.address, "keydb:6379");
        assert_eq!(config.affinity.ttl_secs, 120);
        assert_eq!(config.affinity.renewal_interval_secs, 15 * 60 * 60);
        assert_eq!(config.backend.port, 9980);
        assert_eq!(config.routing.session_param, "WOPISrc");
    }

    #[test]
    fn test_agent_defaults() {
        let config: AgentConfig = toml::from_str(r#"pod_address = "10.1.2.3""#).unwrap();
        assert_eq!(config.pod_address, "10.1.2.3");
        assert_eq!(config.heartbeat.ttl(), Duration::from_secs(30));
        assert_eq!(config.heartbeat.interval(), Duration::from_secs(10));
    }
}
