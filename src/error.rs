use thiserror::Error;

use crate::config::Architecture;

/// Errors raised while building or running the network.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    #[error("layer num must be 2 or 3, {0} is not supported")]
    InvalidLayerCount(i64),

    #[error(
        "{architecture} trunk flattens to {actual} features for this input size, expected {expected}"
    )]
    FeatureSizeMismatch {
        architecture: Architecture,
        expected: i64,
        actual: i64,
    },

    #[error("Torch error: {0}")]
    Tch(#[from] tch::TchError),
}

pub type Result<T> = std::result::Result<T, ModelError>;
