//! Error types for the controller

use ecsub_core::ConfigError;
use ecsub_provider::{ProviderError, ResourceKind};
use std::path::PathBuf;
use thiserror::Error;

/// Errors reading or writing run summaries
#[derive(Debug, Error)]
pub enum SummaryError {
    /// No summary exists for the task name
    #[error("task-name {task_name} is not found in directory {}", workdir.display())]
    TaskNotFound { workdir: PathBuf, task_name: String },

    /// The summary does not match the expected schema
    #[error("corrupt summary {}: {reason}", path.display())]
    CorruptSummary { path: PathBuf, reason: String },

    /// The round's summary was already written
    #[error("summary {} already exists", .0.display())]
    AlreadyPersisted(PathBuf),

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SummaryError {
    pub fn is_task_not_found(&self) -> bool {
        matches!(self, Self::TaskNotFound { .. })
    }
}

/// Errors reading an execution log
#[derive(Debug, Error)]
pub enum ExecutionLogError {
    #[error("failed to read execution log {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed execution log {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors fatal to a controller operation
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Summary(#[from] SummaryError),

    /// An account or environment fact could not be looked up
    #[error("failed to look up {what}: {source}")]
    Lookup {
        what: &'static str,
        source: ProviderError,
    },

    /// A shared cluster resource could not be created
    #[error("failed to create {kind}: {source}")]
    Provision {
        kind: ResourceKind,
        source: ProviderError,
    },
}
