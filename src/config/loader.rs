//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::schema::{AgentConfig, DistributorConfig};
use crate::config::validation::{validate_agent, validate_distributor, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn read_toml<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T, ConfigError> {
    match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        }
        None => Ok(T::default()),
    }
}

/// Load the distributor configuration, falling back to defaults without a file.
///
/// Validation is left to [`finish_distributor`] so CLI overrides can be applied first.
pub fn load_distributor(path: Option<&Path>) -> Result<DistributorConfig, ConfigError> {
    read_toml(path)
}

/// Load the agent configuration, falling back to defaults without a file.
pub fn load_agent(path: Option<&Path>) -> Result<AgentConfig, ConfigError> {
    read_toml(path)
}

/// Validate a fully assembled distributor configuration.
pub fn finish_distributor(config: DistributorConfig) -> Result<DistributorConfig, ConfigError> {
    validate_distributor(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Validate a fully assembled agent configuration.
pub fn finish_agent(config: AgentConfig) -> Result<AgentConfig, ConfigError> {
    validate_agent(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}
