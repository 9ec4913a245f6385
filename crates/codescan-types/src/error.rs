//! Error types for shared domain concerns.

use thiserror::Error;

/// Errors raised while loading or validating settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying config source error
    #[error("Config error: {0}")]
    Load(#[from] config::ConfigError),

    /// A value failed validation
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
