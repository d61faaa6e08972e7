//! Coordination store subsystem.
//!
//! # Data Flow
//! ```text
//! pod-agent ──SET/DEL──▶ pod-registry:<pod>         (heartbeat, short TTL)
//! distributor ─SCAN────▶ pod-registry:*             (candidate pods)
//! distributor ─INCR/DECR▶ connection-count:<pod>    (live tunnels, safety TTL)
//! distributor ─GET/SET/EXPIRE▶ session-affinity:<id> (stickiness, long TTL)
//! ```
//!
//! # Design Decisions
//! - One client instance per process, shared as `Arc<dyn CoordinationStore>`
//! - Every operation is attempted once; callers decide whether a failure is fatal
//! - `MemoryStore` mirrors Redis TTL semantics on the tokio clock

pub mod keys;
pub mod memory;
pub mod redis;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStore;
pub use self::redis::RedisStore;

/// Shared handle to the coordination store.
pub type SharedStore = Arc<dyn CoordinationStore>;

/// Errors returned by coordination store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store connection failed: {0}")]
    Connection(String),

    #[error("store command failed: {0}")]
    Command(String),

    #[error("value at {key} is not an integer")]
    NotAnInteger { key: String },
}

impl From<::redis::RedisError> for StoreError {
    fn from(err: ::redis::RedisError) -> Self {
        if err.is_connection_dropped() || err.is_connection_refusal() || err.is_io_error() {
            StoreError::Connection(err.to_string())
        } else {
            StoreError::Command(err.to_string())
        }
    }
}

/// A TTL-expiring key-value store with atomic counters and prefix enumeration.
#[async_trait]
pub trait CoordinationStore: Send + Sync + std::fmt::Debug {
    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Read a string value.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value that expires after `ttl`.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Reset the expiry of an existing key. Returns false if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Delete a key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Atomically increment an integer value, creating it at 0 first if absent.
    async fn incr(&self, key: &str) -> Result<i64, StoreError>;

    /// Atomically decrement an integer value, creating it at 0 first if absent.
    async fn decr(&self, key: &str) -> Result<i64, StoreError>;

    /// List every live key starting with `prefix`. Order is unspecified.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}
