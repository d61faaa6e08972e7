//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, defaults for missing fields)
//!     → CLI flags / environment overrides (binaries)
//!     → validation.rs (semantic checks)
//!     → DistributorConfig / AgentConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::{
    AffinityConfig, AgentConfig, BackendConfig, ConnectionCountConfig, DistributorConfig,
    HeartbeatConfig, ListenerConfig, ObservabilityConfig, RoutingConfig, StoreConfig,
    TimeoutConfig,
};
