//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check timing relations (renewal and refresh faster than their TTLs)
//! - Validate value ranges (TTLs > 0, ports valid, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: config → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::{AgentConfig, DistributorConfig, StoreConfig};
use crate::load_balancer::PodAddr;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate the distributor configuration.
pub fn validate_distributor(config: &DistributorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    check_store(&config.store, &mut errors);

    if config.affinity.ttl_secs == 0 {
        errors.push(ValidationError::new("affinity.ttl_secs", "must be greater than 0"));
    }
    if config.affinity.renewal_interval_secs == 0 {
        errors.push(ValidationError::new("affinity.renewal_interval_secs", "must be greater than 0"));
    } else if config.affinity.renewal_interval_secs >= config.affinity.ttl_secs {
        errors.push(ValidationError::new(
            "affinity.renewal_interval_secs",
            "must be shorter than affinity.ttl_secs",
        ));
    }

    if config.connections.ttl_secs == 0 {
        errors.push(ValidationError::new("connections.ttl_secs", "must be greater than 0"));
    }

    if config.backend.port == 0 {
        errors.push(ValidationError::new("backend.port", "must be a valid port"));
    }
    if config.backend.tunnel_host.is_empty() {
        errors.push(ValidationError::new("backend.tunnel_host", "must not be empty"));
    }

    if config.routing.session_param.is_empty() {
        errors.push(ValidationError::new("routing.session_param", "must not be empty"));
    }
    if !config.routing.tunnel_prefix.starts_with('/') {
        errors.push(ValidationError::new("routing.tunnel_prefix", "must start with '/'"));
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be greater than 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the pod agent configuration.
pub fn validate_agent(config: &AgentConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_store(&config.store, &mut errors);

    if PodAddr::parse(&config.pod_address).is_none() {
        errors.push(ValidationError::new(
            "pod_address",
            format!("'{}' is not a valid host", config.pod_address),
        ));
    }

    if config.heartbeat.ttl_secs == 0 {
        errors.push(ValidationError::new("heartbeat.ttl_secs", "must be greater than 0"));
    }
    if config.heartbeat.interval_secs == 0 {
        errors.push(ValidationError::new("heartbeat.interval_secs", "must be greater than 0"));
    } else if config.heartbeat.interval_secs >= config.heartbeat.ttl_secs {
        errors.push(ValidationError::new(
            "heartbeat.interval_secs",
            "must be shorter than heartbeat.ttl_secs",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_store(store: &StoreConfig, errors: &mut Vec<ValidationError>) {
    if store.address.is_empty() {
        errors.push(ValidationError::new("store.address", "must not be empty"));
    }
}
