//! Error types for cluster providers

use std::time::Duration;
use thiserror::Error;

/// Result type alias for provider operations
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors that can occur when talking to a cluster provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No capacity of the requested kind is available right now
    #[error("no capacity available: {0}")]
    NoCapacity(String),

    /// The resource does not exist (anymore)
    #[error("resource not found: {0}")]
    NotFound(String),

    /// A dependent resource blocks the operation
    #[error("resource in use: {0}")]
    InUse(String),

    /// The provider command exited unsuccessfully
    #[error("command `{command}` failed (exit code {exit_code}): {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// The provider answered with something we could not interpret
    #[error("failed to parse provider response: {0}")]
    Parse(String),

    /// The call did not finish before its deadline
    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),

    /// Spawning the provider command failed
    #[error("failed to run provider command: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    pub fn is_no_capacity(&self) -> bool {
        matches!(self, Self::NoCapacity(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_in_use(&self) -> bool {
        matches!(self, Self::InUse(_))
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
