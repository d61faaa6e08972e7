//! Pod liveness subsystem.
//!
//! # Data Flow
//! ```text
//! pod-agent start
//!     → heartbeat.rs register (SET pod-registry:<pod> "1" PX ttl), fatal on failure
//!     → every interval: rewrite the record (failures logged)
//!     → SIGTERM/SIGINT: DEL pod-registry:<pod> (best effort)
//!
//! Distributor reads the same keys through load_balancer::registry.
//! ```
//!
//! # Design Decisions
//! - Liveness is purely TTL based; a silent pod disappears on its own
//! - Refresh interval is validated to be shorter than the TTL

pub mod heartbeat;

pub use heartbeat::{AgentError, HeartbeatAgent};
