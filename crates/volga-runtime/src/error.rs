//! Runtime error types.

use std::path::PathBuf;

use thiserror::Error;
use volga_core::{ApiError, PollError};

/// Errors that can occur while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No access token was provided via file or environment.
    #[error("no access token configured (set VOLGA_ACCESS_TOKEN or access_token in volga.toml)")]
    MissingToken,

    /// The requested configuration file does not exist.
    #[error("configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Configuration could not be parsed or extracted.
    #[error("failed to load configuration: {0}")]
    Load(String),
}

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration loading or validation failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The event feed failed beyond recovery.
    #[error(transparent)]
    Poll(#[from] PollError),

    /// A control API call failed during startup.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
