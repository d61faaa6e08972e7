//! Session-affinity load balancer for document-collaboration pods.
//!
//! Pods announce themselves through TTL heartbeats in a shared coordination
//! store. The distributor binds every session to one pod, sends new sessions
//! to the live pod with the fewest open tunnels and relays WebSocket and
//! plain HTTP traffic to it.

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod routing;
pub mod store;

// Traffic management
pub mod health;
pub mod load_balancer;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::{AgentConfig, DistributorConfig};
pub use error::DistributorError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use store::{CoordinationStore, MemoryStore, RedisStore, SharedStore};
