//! CLI error types and conversions

use crate::fetcher::FetcherError;
use crate::harvester::HarvestError;
use crate::index::IndexError;
use crate::output::OutputError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Fetcher error
    #[error("fetcher error: {0}")]
    FetcherError(#[from] FetcherError),

    /// Harvest error
    #[error("harvest error: {0}")]
    HarvestError(#[from] HarvestError),

    /// Output error
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// Index error
    #[error("index error: {0}")]
    IndexError(#[from] IndexError),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}

impl CliError {
    /// Whether the failure comes from an unusable storage location
    pub fn is_storage(&self) -> bool {
        matches!(self, CliError::HarvestError(HarvestError::Storage { .. }))
    }
}
