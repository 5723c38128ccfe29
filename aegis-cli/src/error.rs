//! CLI error type.

use aegis_api::ApiError;
use aegis_core::{AegisError, ConfigError, QuotaError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Quota Exceeded. Upgrade to Pro for unlimited access.")]
    QuotaExceeded(#[from] QuotaError),

    #[error("Metrics backend unreachable: {0}")]
    Unreachable(String),

    #[error(transparent)]
    Aegis(#[from] AegisError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

pub type CliResult<T> = Result<T, CliError>;
