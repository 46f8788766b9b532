//! Task execution seam
//!
//! Running a job's container on its instance is done by external tooling.
//! The round coordinator only needs its exit code and where it left the
//! execution log.

use anyhow::Result;
use async_trait::async_trait;
use ecsub_provider::LaunchResult;
use std::path::PathBuf;

/// What an external task run reports back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub exit_code: i32,

    /// Execution log of the run, if one was written
    pub log_path: Option<PathBuf>,
}

/// Runs a job's container on the instance launched for it
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Executes job `job_index` on `launch` and waits for it to finish
    async fn execute(&self, job_index: usize, launch: &LaunchResult) -> Result<ExecutionOutcome>;
}
