//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (binaries):
//!     Load config → Validate → Connect store → PING → Bind → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → trigger → server stops accepting / agent deregisters
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: a store that cannot be reached at startup is fatal
//! - Established tunnels are not cancelled by shutdown; they end with their peers

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
