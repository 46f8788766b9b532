//! In-memory provider and executor for controller tests

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use ecsub_core::config::SubmitConfig;
use ecsub_core::cost::build_job_result;
use ecsub_core::domain::resource::{ResourceDescriptor, ResourceRequest};
use ecsub_core::domain::summary::{LOG_DIR, RunSummary};
use ecsub_provider::{
    CapacitySpec, ClusterProvider, LaunchResult, ProviderError, ResourceId, ResourceKind,
    ResourceSpec,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::SummaryError;
use crate::repository::{FsSummaryStore, SummaryStore};
use crate::service::{ExecutionOutcome, TaskExecutor};

pub const OD_PRICE: f64 = 0.096;
pub const SPOT_PRICE: f64 = 0.035;

pub fn sample_config(task_count: usize) -> SubmitConfig {
    let mut config = SubmitConfig::new("/data", "jobA", task_count);
    config.cluster_name = "jobA-0001".to_string();
    config.image = "python:3.7".to_string();
    config.instance_type = "m5.large".to_string();
    config
}

/// Two finished on-demand jobs under `task_dir`
pub fn sample_summary(task_dir: &Path, round: u32) -> RunSummary {
    let mut descriptor = ResourceDescriptor::from_config(&sample_config(2)).unwrap();
    descriptor.cluster_arn = "arn:aws:ecs:us-east-1:123456789012:cluster/jobA-0001".to_string();
    descriptor.task_definition_arn =
        "arn:aws:ecs:us-east-1:123456789012:task-definition/jobA-0001:1".to_string();
    descriptor.security_group_id = "sg-1".to_string();
    descriptor.security_group_ownership = ecsub_core::domain::resource::Ownership::External;

    let start = Utc.with_ymd_and_hms(2019, 5, 23, 15, 29, 19).unwrap();
    let mut request = ResourceRequest::new(false, "m5.large");
    request.od_price = OD_PRICE;

    let jobs = (0..2)
        .map(|i| {
            build_job_result(
                &request,
                start,
                start + ChronoDuration::minutes(30 * (i + 1)),
                Some(task_dir.join(LOG_DIR).join(format!("run-tasks.{i}.log"))),
                None,
                0,
            )
        })
        .collect();

    RunSummary::from_descriptor(&descriptor, task_dir, round, jobs)
}

/// Cluster provider with scripted capacity and failures
pub struct ScriptedProvider {
    spot_capacity: bool,
    /// Jobs denied spot capacity
    no_spot_jobs: HashSet<usize>,
    /// Only these types get spot capacity, when set
    spot_types: Option<HashSet<String>>,
    no_on_demand: HashSet<String>,
    launch_delay: Duration,
    spot_delay: Duration,
    abandoned: Mutex<Vec<usize>>,
    terminate_errors: Mutex<HashMap<ResourceKind, ProviderError>>,
    on_demand_launches: AtomicUsize,
    next_instance: AtomicUsize,
    created: Mutex<Vec<ResourceKind>>,
    terminated: Mutex<Vec<ResourceId>>,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self {
            spot_capacity: true,
            no_spot_jobs: HashSet::new(),
            spot_types: None,
            no_on_demand: HashSet::new(),
            launch_delay: Duration::ZERO,
            spot_delay: Duration::ZERO,
            abandoned: Mutex::new(Vec::new()),
            terminate_errors: Mutex::new(HashMap::new()),
            on_demand_launches: AtomicUsize::new(0),
            next_instance: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
            terminated: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedProvider {
    pub fn without_spot(mut self) -> Self {
        self.spot_capacity = false;
        self
    }

    pub fn without_spot_for(mut self, job_index: usize) -> Self {
        self.no_spot_jobs.insert(job_index);
        self
    }

    pub fn with_spot_only_for(mut self, instance_types: &[&str]) -> Self {
        self.spot_types = Some(instance_types.iter().map(|t| t.to_string()).collect());
        self
    }

    /// Delays spot launches only
    pub fn with_spot_delay(mut self, delay: Duration) -> Self {
        self.spot_delay = delay;
        self
    }

    pub fn without_on_demand(mut self, instance_type: &str) -> Self {
        self.no_on_demand.insert(instance_type.to_string());
        self
    }

    pub fn with_launch_delay(mut self, delay: Duration) -> Self {
        self.launch_delay = delay;
        self
    }

    /// The first release of `kind` fails with `error`
    pub fn with_terminate_error(self, kind: ResourceKind, error: ProviderError) -> Self {
        self.terminate_errors.lock().unwrap().insert(kind, error);
        self
    }

    pub fn created(&self) -> Vec<ResourceKind> {
        self.created.lock().unwrap().clone()
    }

    /// Shared resources released, instances excluded
    pub fn terminated(&self) -> Vec<ResourceId> {
        self.terminated
            .lock()
            .unwrap()
            .iter()
            .filter(|id| id.kind() != ResourceKind::Instance)
            .cloned()
            .collect()
    }

    pub fn terminated_instances(&self) -> usize {
        self.terminated
            .lock()
            .unwrap()
            .iter()
            .filter(|id| id.kind() == ResourceKind::Instance)
            .count()
    }

    /// Jobs whose abandoned launches were swept, in call order
    pub fn abandoned_sweeps(&self) -> Vec<usize> {
        self.abandoned.lock().unwrap().clone()
    }

    pub fn on_demand_launches(&self) -> usize {
        self.on_demand_launches.load(Ordering::SeqCst)
    }

    fn instance(&self, instance_type: &str, zone: &str, price: f64) -> LaunchResult {
        let n = self.next_instance.fetch_add(1, Ordering::SeqCst);
        LaunchResult {
            instance_id: format!("i-{n:04}"),
            instance_type: instance_type.to_string(),
            availability_zone: zone.to_string(),
            hourly_price: price,
        }
    }
}

#[async_trait]
impl ClusterProvider for ScriptedProvider {
    async fn launch_on_demand(
        &self,
        instance_type: &str,
        _spec: &CapacitySpec,
    ) -> ecsub_provider::Result<LaunchResult> {
        tokio::time::sleep(self.launch_delay).await;
        self.on_demand_launches.fetch_add(1, Ordering::SeqCst);

        if self.no_on_demand.contains(instance_type) {
            return Err(ProviderError::NoCapacity(instance_type.to_string()));
        }
        Ok(self.instance(instance_type, "us-east-1c", OD_PRICE))
    }

    async fn launch_spot(
        &self,
        candidates: &[String],
        spec: &CapacitySpec,
    ) -> ecsub_provider::Result<LaunchResult> {
        tokio::time::sleep(self.launch_delay + self.spot_delay).await;

        let granted = candidates.iter().find(|candidate| match &self.spot_types {
            Some(types) => types.contains(*candidate),
            None => true,
        });

        let denied = !self.spot_capacity || self.no_spot_jobs.contains(&spec.job_index);
        match granted {
            Some(candidate) if !denied => Ok(self.instance(candidate, "us-east-1a", SPOT_PRICE)),
            _ => Err(ProviderError::NoCapacity(candidates.join(","))),
        }
    }

    async fn terminate_job_instances(&self, spec: &CapacitySpec) -> ecsub_provider::Result<()> {
        self.abandoned.lock().unwrap().push(spec.job_index);
        Ok(())
    }

    async fn on_demand_price(&self, _instance_type: &str) -> ecsub_provider::Result<f64> {
        Ok(OD_PRICE)
    }

    async fn create(&self, resource: &ResourceSpec) -> ecsub_provider::Result<String> {
        self.created.lock().unwrap().push(resource.kind());

        Ok(match resource {
            ResourceSpec::KeyPair { name, .. } => name.clone(),
            ResourceSpec::SecurityGroup { .. } => "sg-created".to_string(),
            ResourceSpec::Cluster { name } => format!("arn:cluster/{name}"),
            ResourceSpec::TaskDefinition { family, .. } => {
                format!("arn:task-definition/{family}:1")
            }
        })
    }

    async fn terminate(&self, resource: &ResourceId) -> ecsub_provider::Result<()> {
        self.terminated.lock().unwrap().push(resource.clone());

        match self.terminate_errors.lock().unwrap().remove(&resource.kind()) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn ami_id(&self) -> ecsub_provider::Result<String> {
        Ok("ami-0test".to_string())
    }

    async fn account_id(&self) -> ecsub_provider::Result<String> {
        Ok("123456789012".to_string())
    }

    async fn region(&self) -> ecsub_provider::Result<String> {
        Ok("us-east-1".to_string())
    }
}

/// Executor that writes a well-formed execution log per job
pub struct ScriptedExecutor {
    log_dir: PathBuf,
    exit_code: i32,
    /// Jobs whose log is left unreadable
    broken_logs: HashSet<usize>,
    /// Jobs whose run panics
    panics: HashSet<usize>,
}

impl ScriptedExecutor {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            exit_code: 0,
            broken_logs: HashSet::new(),
            panics: HashSet::new(),
        }
    }

    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = exit_code;
        self
    }

    pub fn with_broken_log(mut self, job_index: usize) -> Self {
        self.broken_logs.insert(job_index);
        self
    }

    pub fn with_panic(mut self, job_index: usize) -> Self {
        self.panics.insert(job_index);
        self
    }
}

#[async_trait]
impl TaskExecutor for ScriptedExecutor {
    async fn execute(&self, job_index: usize, launch: &LaunchResult) -> Result<ExecutionOutcome> {
        if self.panics.contains(&job_index) {
            panic!("job {job_index} crashed");
        }

        std::fs::create_dir_all(&self.log_dir)?;
        let path = self.log_dir.join(format!("run-tasks.{job_index}.log"));

        let body = if self.broken_logs.contains(&job_index) {
            "{truncated".to_string()
        } else {
            serde_json::json!({
                "appendex": {"instance_id": launch.instance_id, "subnet_id": "subnet-1"},
                "tasks": [{"overrides": {"containerOverrides": [{"memory": 300, "cpu": 1024}]}}]
            })
            .to_string()
        };
        std::fs::write(&path, body)?;

        Ok(ExecutionOutcome {
            exit_code: self.exit_code,
            log_path: Some(path),
        })
    }
}

/// Filesystem store that remembers the `print_cost` flag of every save
#[derive(Default)]
pub struct RecordingStore {
    inner: FsSummaryStore,
    print_cost: Mutex<Vec<bool>>,
}

impl RecordingStore {
    pub fn print_cost_flags(&self) -> Vec<bool> {
        self.print_cost.lock().unwrap().clone()
    }
}

impl SummaryStore for RecordingStore {
    fn find(&self, workdir: &Path, task_name: &str) -> Result<Vec<PathBuf>, SummaryError> {
        self.inner.find(workdir, task_name)
    }

    fn load(&self, path: &Path) -> Result<RunSummary, SummaryError> {
        self.inner.load(path)
    }

    fn save(&self, summary: &RunSummary, print_cost: bool) -> Result<PathBuf, SummaryError> {
        self.print_cost.lock().unwrap().push(print_cost);
        self.inner.save(summary, print_cost)
    }
}
