//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Session has no affinity
//!     → registry.rs (scan pod-registry:*, parse pod addresses)
//!     → counter.rs (read connection-count:<pod> for each)
//!     → least_conn.rs (pick minimum, lexicographic tie-break)
//!     → PodAddr or NoAvailablePods
//!
//! Tunnel established / terminated
//!     → counter.rs (INCR + refresh TTL / DECR)
//! ```
//!
//! # Design Decisions
//! - Load balancer is stateless; the coordination store tracks connections
//! - Pods without a live heartbeat are never candidates
//! - Selection is a pure function of the observed loads

pub mod counter;
pub mod least_conn;
pub mod pod;
pub mod registry;

pub use counter::ConnectionCounter;
pub use pod::PodAddr;
pub use registry::PodRegistry;

/// A candidate pod with its observed live connection count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodLoad {
    pub addr: PodAddr,
    pub connections: i64,
}

/// Placement strategy over candidate pods.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Select a pod, or `None` if there are no candidates.
    fn next_pod(&self, candidates: &[PodLoad]) -> Option<PodAddr>;
}
