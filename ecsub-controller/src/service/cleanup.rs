//! Cleanup entry point
//!
//! Invoked separately from submission: finds a task's persisted summary and
//! releases the cluster resources it recorded.

use ecsub_core::domain::resource::ResourceDescriptor;
use std::path::Path;
use tracing::info;

use crate::controller::{CleanupReport, ClusterController};
use crate::error::SummaryError;
use crate::repository::SummaryStore;

/// Releases the resources of task `task_name` under `workdir`
///
/// Identity fields are taken from the first summary found; every round of a
/// task shares the same cluster.
pub async fn delete_task(
    store: &dyn SummaryStore,
    controller: &ClusterController,
    workdir: &Path,
    task_name: &str,
) -> Result<CleanupReport, SummaryError> {
    let paths = store.find(workdir, task_name)?;
    let Some(first) = paths.first() else {
        return Err(SummaryError::TaskNotFound {
            workdir: workdir.to_path_buf(),
            task_name: task_name.to_string(),
        });
    };
    let summary = store.load(first)?;

    info!("Cleaning up {} from {}", summary.cluster_name, first.display());

    let descriptor = ResourceDescriptor::from_summary(&summary);
    Ok(controller.clean_up(&descriptor).await)
}
