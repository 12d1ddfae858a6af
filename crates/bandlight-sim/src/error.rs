//! Simulation errors.

use thiserror::Error;

/// Errors loading or validating a simulation model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Duplicate station name: {0}")]
    DuplicateName(String),

    #[error("Duplicate radio address {address} on {name}")]
    DuplicateAddress { name: String, address: String },

    #[error("Link references unknown station: {0}")]
    UnknownStation(String),

    #[error("Link {from} -> {to} has loss {loss}, expected 0.0..=1.0")]
    InvalidLoss { from: String, to: String, loss: f64 },

    #[error("Link {0} connects a station to itself")]
    SelfLink(String),
}

/// Errors running a simulation.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),
}
