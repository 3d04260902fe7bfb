//! CLI error types.

use thiserror::Error;

/// Errors reported by the command-line front end.
#[derive(Debug, Error)]
pub enum CliError {
    /// Error from the entity engine.
    #[error(transparent)]
    Core(#[from] stayhub_core::Error),

    /// A record argument was not a JSON object.
    #[error("invalid record JSON: {0}")]
    InvalidJson(String),

    /// A malformed argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Output encoding failed.
    #[error("output error: {0}")]
    Output(#[from] serde_json::Error),
}

/// Result type for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;
