//! Summary store
//!
//! One summary file per round, under `<wdir>/<task_name>/log/`. Files are
//! written once and never modified afterwards.

use ecsub_core::cost::aggregate_cost;
use ecsub_core::domain::summary::{
    LOG_DIR, RunSummary, is_summary_file_name, parse_summary_file_name,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::SummaryError;

/// Persistence of run summaries
pub trait SummaryStore: Send + Sync {
    /// Summary files of a task, in lexicographic order
    ///
    /// Fails with [`SummaryError::TaskNotFound`] when the task has no summary.
    fn find(&self, workdir: &Path, task_name: &str) -> Result<Vec<PathBuf>, SummaryError>;

    fn load(&self, path: &Path) -> Result<RunSummary, SummaryError>;

    /// Persists a round's summary and returns where it was written
    ///
    /// Logs the round's cost report when `print_cost` is set.
    fn save(&self, summary: &RunSummary, print_cost: bool) -> Result<PathBuf, SummaryError>;

    /// Round number the next submission of a task will use
    fn next_round(&self, workdir: &Path, task_name: &str) -> Result<u32, SummaryError> {
        let paths = match self.find(workdir, task_name) {
            Ok(paths) => paths,
            Err(e) if e.is_task_not_found() => return Ok(1),
            Err(e) => return Err(e),
        };

        let last = paths
            .iter()
            .filter_map(|p| p.file_name()?.to_str())
            .filter_map(parse_summary_file_name)
            .max()
            .unwrap_or(0);

        Ok(last + 1)
    }

    /// Every summary of a task, in file order
    fn load_all(&self, workdir: &Path, task_name: &str) -> Result<Vec<RunSummary>, SummaryError> {
        self.find(workdir, task_name)?
            .iter()
            .map(|path| self.load(path))
            .collect()
    }
}

/// Summary store backed by the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSummaryStore;

impl FsSummaryStore {
    pub fn new() -> Self {
        Self
    }
}

impl SummaryStore for FsSummaryStore {
    fn find(&self, workdir: &Path, task_name: &str) -> Result<Vec<PathBuf>, SummaryError> {
        let not_found = || SummaryError::TaskNotFound {
            workdir: workdir.to_path_buf(),
            task_name: task_name.to_string(),
        };

        let log_dir = workdir.join(task_name).join(LOG_DIR);
        let entries = match std::fs::read_dir(&log_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(source) => {
                return Err(SummaryError::Io {
                    path: log_dir,
                    source,
                });
            }
        };

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| SummaryError::Io {
                path: log_dir.clone(),
                source,
            })?;
            let path = entry.path();
            let matches = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(is_summary_file_name);

            if matches && path.is_file() {
                paths.push(path);
            }
        }

        if paths.is_empty() {
            return Err(not_found());
        }

        paths.sort();
        debug!("Found {} summary file(s) in {}", paths.len(), log_dir.display());
        Ok(paths)
    }

    fn load(&self, path: &Path) -> Result<RunSummary, SummaryError> {
        let bytes = std::fs::read(path).map_err(|source| SummaryError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        RunSummary::from_json_slice(&bytes).map_err(|e| SummaryError::CorruptSummary {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn save(&self, summary: &RunSummary, print_cost: bool) -> Result<PathBuf, SummaryError> {
        let path = summary.path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error(parent))?;
        }

        let bytes = summary
            .to_json_bytes()
            .map_err(|e| SummaryError::CorruptSummary {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        // Readers never observe a partially written summary. The link fails
        // if the round is already persisted.
        let tmp = path.with_extension("log.tmp");
        let linked = std::fs::write(&tmp, &bytes)
            .map_err(io_error(&tmp))
            .and_then(|()| match std::fs::hard_link(&tmp, &path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    Err(SummaryError::AlreadyPersisted(path.clone()))
                }
                Err(e) => Err(io_error(&path)(e)),
            });
        let _ = std::fs::remove_file(&tmp);
        linked?;

        info!(
            "Saved summary of {} round {} to {}",
            summary.cluster_name,
            summary.round,
            path.display()
        );

        if print_cost {
            info!("{}", aggregate_cost(summary).message());
        }

        Ok(path)
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SummaryError {
    let path = path.to_path_buf();
    move |source| SummaryError::Io { path, source }
}
