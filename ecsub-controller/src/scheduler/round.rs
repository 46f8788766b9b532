//! Round coordinator
//!
//! Runs every job of one submission round: one task per job, bounded by the
//! configured number of processes. Each task owns its job's request while it
//! runs; results are collected by index once every task has finished, and
//! the round's summary is written exactly once.

use chrono::Utc;
use ecsub_core::cost::build_job_result;
use ecsub_core::domain::job::{JobResult, LAUNCH_FAILED_EXIT_CODE};
use ecsub_core::domain::resource::{ResourceDescriptor, ResourceRequest};
use ecsub_core::domain::state::{JobLifecycle, JobState};
use ecsub_core::domain::summary::RunSummary;
use ecsub_provider::CapacitySpec;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::config::ControllerConfig;
use crate::controller::ClusterController;
use crate::error::ControllerError;
use crate::repository::{SummaryStore, read_execution_log};
use crate::service::TaskExecutor;

/// Exit code recorded when the executor itself failed
pub const EXECUTION_FAILED_EXIT_CODE: i32 = 1;

/// Everything a job task needs, owned by that task
struct JobTask {
    request: ResourceRequest,
    candidates: Arc<Vec<String>>,
    retry_on_demand: bool,
    spec: CapacitySpec,
}

/// What a finished job task hands back to the coordinator
struct JobOutcome {
    request: ResourceRequest,
    result: JobResult,
    state: JobState,
}

/// Drives the jobs of a round from launch to the persisted summary
pub struct RoundCoordinator {
    controller: Arc<ClusterController>,
    store: Arc<dyn SummaryStore>,
    semaphore: Arc<Semaphore>,
    print_cost: bool,
}

impl RoundCoordinator {
    /// Fails if `config` does not validate
    pub fn new(
        config: &ControllerConfig,
        controller: Arc<ClusterController>,
        store: Arc<dyn SummaryStore>,
    ) -> Result<Self, ControllerError> {
        config.validate()?;

        Ok(Self {
            controller,
            store,
            semaphore: Arc::new(Semaphore::new(config.processes)),
            print_cost: config.print_cost,
        })
    }

    /// Runs round `round` of the batch described by `descriptor`
    ///
    /// Per-job failures are recorded in the summary and never abort the
    /// round. Only a failure to persist the summary is returned as an error.
    pub async fn run_round(
        &self,
        descriptor: &mut ResourceDescriptor,
        task_dir: &Path,
        round: u32,
        executor: Arc<dyn TaskExecutor>,
    ) -> Result<RunSummary, ControllerError> {
        info!(
            "Starting round {} of {} with {} job(s)",
            round,
            descriptor.cluster_name,
            descriptor.task_count()
        );

        let candidates = Arc::new(descriptor.instance_types.clone());
        let mut handles = Vec::with_capacity(descriptor.task_count());

        for (index, request) in descriptor.job_requests.iter().enumerate() {
            let task = JobTask {
                request: request.clone(),
                candidates: Arc::clone(&candidates),
                retry_on_demand: descriptor.retry_on_demand,
                spec: self.controller.capacity_spec(descriptor, index),
            };
            handles.push(self.spawn_job_task(task, Arc::clone(&executor)));
        }

        let mut jobs = Vec::with_capacity(handles.len());
        let mut completed = 0;

        for (index, handle) in handles.into_iter().enumerate() {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Job {} task panicked: {}", index, e);
                    launch_failed(descriptor.job_requests[index].clone())
                }
            };

            debug!("Job {} finished as {}", index, outcome.state);
            if outcome.state == JobState::Completed {
                completed += 1;
            }

            descriptor.job_requests[index] = outcome.request;
            jobs.push(outcome.result);
        }

        info!(
            "Round {} of {}: {}/{} job(s) completed",
            round,
            descriptor.cluster_name,
            completed,
            jobs.len()
        );

        let summary = RunSummary::from_descriptor(descriptor, task_dir, round, jobs);
        self.store.save(&summary, self.print_cost)?;

        Ok(summary)
    }

    /// Spawns a task running a single job
    fn spawn_job_task(
        &self,
        task: JobTask,
        executor: Arc<dyn TaskExecutor>,
    ) -> tokio::task::JoinHandle<JobOutcome> {
        let semaphore = Arc::clone(&self.semaphore);
        let controller = Arc::clone(&self.controller);

        tokio::spawn(async move {
            // Permit is released when the task ends
            let _permit = semaphore.acquire_owned().await.ok();
            Self::run_job(task, controller, executor).await
        })
    }

    /// Launches, executes and accounts one job
    async fn run_job(
        task: JobTask,
        controller: Arc<ClusterController>,
        executor: Arc<dyn TaskExecutor>,
    ) -> JobOutcome {
        let JobTask {
            mut request,
            candidates,
            retry_on_demand,
            spec,
        } = task;
        let index = spec.job_index;
        let mut lifecycle = JobLifecycle::new(index);

        advance(&mut lifecycle, JobState::Launching);
        let start = Utc::now();

        let Some(launch) = controller
            .launch_job(&mut request, &candidates, retry_on_demand, &spec)
            .await
        else {
            advance(&mut lifecycle, JobState::LaunchFailed);
            let result = build_job_result(
                &request,
                start,
                Utc::now(),
                None,
                None,
                LAUNCH_FAILED_EXIT_CODE,
            );
            return JobOutcome {
                request,
                result,
                state: lifecycle.state(),
            };
        };

        advance(&mut lifecycle, JobState::Running);
        info!("Job {} running on {}", index, launch.instance_id);

        // The instance is released even if the executor panics
        let execution = {
            let launch = launch.clone();
            tokio::spawn(async move { executor.execute(index, &launch).await }).await
        };

        let (exit_code, log_path) = match execution {
            Ok(Ok(outcome)) => (outcome.exit_code, outcome.log_path),
            Ok(Err(e)) => {
                warn!("Job {} execution failed: {:#}", index, e);
                (EXECUTION_FAILED_EXIT_CODE, None)
            }
            Err(e) => {
                error!("Job {} execution panicked: {}", index, e);
                (LAUNCH_FAILED_EXIT_CODE, None)
            }
        };

        controller.release_instance(&launch.instance_id).await;
        let end = Utc::now();

        let facts = match &log_path {
            Some(path) => match read_execution_log(path) {
                Ok(log) => {
                    let facts = log.instance_facts();
                    if facts.is_none() {
                        warn!("Job {}: execution log {} has no task", index, path.display());
                    }
                    facts
                }
                Err(e) => {
                    warn!("Job {}: {}", index, e);
                    None
                }
            },
            None => None,
        };

        advance(&mut lifecycle, JobState::Completed);
        let result = build_job_result(&request, start, end, log_path, facts.as_ref(), exit_code);

        JobOutcome {
            request,
            result,
            state: lifecycle.state(),
        }
    }
}

/// Outcome of a job whose task never reported back
fn launch_failed(request: ResourceRequest) -> JobOutcome {
    let now = Utc::now();
    let result = build_job_result(&request, now, now, None, None, LAUNCH_FAILED_EXIT_CODE);

    JobOutcome {
        request,
        result,
        state: JobState::LaunchFailed,
    }
}

fn advance(lifecycle: &mut JobLifecycle, to: JobState) {
    if let Err(e) = lifecycle.advance(to) {
        error!("{}", e);
    }
}
