//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, query, body)
//!     → matcher.rs (tunnel or plain)
//!     → session.rs (session identifier from query or form body)
//!     → router.rs (placement)
//!         → affinity.rs (existing mapping? renew)
//!         → load_balancer (otherwise select + affinity.rs register)
//!     → Return: Placement or error
//! ```
//!
//! # Design Decisions
//! - No in-process routing state; the coordination store is authoritative
//! - Deterministic: same store state always yields the same pod
//! - No regex in hot path (prefix/suffix matching only)

pub mod affinity;
pub mod matcher;
pub mod router;
pub mod session;

pub use affinity::AffinityResolver;
pub use matcher::{RequestKind, TunnelMatcher};
pub use router::{Placement, PlacementKind, SessionRouter};
pub use session::SessionExtractor;
