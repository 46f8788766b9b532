//! ecsub Controller
//!
//! Drives a batch through its resource lifecycle.
//!
//! Architecture:
//! - Configuration: controller settings from environment or defaults
//! - Repositories: summary files and execution logs on local disk
//! - Controller: provisioning, spot/on-demand launch policy, cleanup
//! - Services: the external task executor seam and the cleanup entry point
//! - Scheduler: the per-round fan-out of job launches and the summary barrier

pub mod config;
pub mod controller;
pub mod error;
pub mod repository;
pub mod scheduler;
pub mod service;

#[cfg(test)]
mod testing;

pub use config::ControllerConfig;
pub use controller::{CleanupEntry, CleanupOutcome, CleanupReport, ClusterController};
pub use error::{ControllerError, ExecutionLogError, SummaryError};
pub use repository::{FsSummaryStore, SummaryStore};
pub use scheduler::RoundCoordinator;
pub use service::{ExecutionOutcome, TaskExecutor};
