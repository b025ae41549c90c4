//! Error types for the edge node

use edge_shared::AdapterError;
use thiserror::Error;

use crate::transport::TransportError;

/// Missing or malformed startup parameter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Top-level failure of the edge node lifecycle
#[derive(Error, Debug)]
pub enum EdgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),
}
