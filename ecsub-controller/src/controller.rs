//! Cluster controller
//!
//! Owns the provisioning policy of a batch: preparing and creating the shared
//! cluster resources, launching each job's instance with the spot/on-demand
//! fallback rules, and releasing everything the batch owns.

use ecsub_core::config::SubmitConfig;
use ecsub_core::domain::resource::{Ownership, ResourceDescriptor, ResourceRequest};
use ecsub_provider::{
    CapacitySpec, ClusterProvider, LaunchResult, ProviderError, ResourceId, ResourceKind,
    ResourceSpec,
};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ControllerError;

/// Directory (under the task directory) holding generated key material
pub const CONF_DIR: &str = "conf";

/// Result of releasing one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    Released,
    /// Supplied by the caller, left untouched
    SkippedExternal,
    /// Never created, nothing to release
    SkippedNoHandle,
    /// Already gone
    NotFound,
    /// A dependent resource blocks deletion
    InUse(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupEntry {
    pub kind: ResourceKind,
    pub handle: String,
    pub outcome: CleanupOutcome,
}

/// Per-resource outcome of a cleanup, in release order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub entries: Vec<CleanupEntry>,
}

impl CleanupReport {
    fn record(&mut self, kind: ResourceKind, handle: &str, outcome: CleanupOutcome) {
        self.entries.push(CleanupEntry {
            kind,
            handle: handle.to_string(),
            outcome,
        });
    }

    /// Whether a release of `kind` was sent to the provider
    pub fn attempted(&self, kind: ResourceKind) -> bool {
        self.entries.iter().any(|e| {
            e.kind == kind
                && !matches!(
                    e.outcome,
                    CleanupOutcome::SkippedExternal | CleanupOutcome::SkippedNoHandle
                )
        })
    }

    /// Entries left behind in the cloud
    pub fn leftovers(&self) -> impl Iterator<Item = &CleanupEntry> {
        self.entries.iter().filter(|e| {
            matches!(
                e.outcome,
                CleanupOutcome::InUse(_) | CleanupOutcome::Failed(_)
            )
        })
    }

    /// True when nothing the batch owns was left behind
    pub fn is_clean(&self) -> bool {
        self.leftovers().next().is_none()
    }
}

/// Drives the resource lifecycle of a batch through a [`ClusterProvider`]
pub struct ClusterController {
    provider: Arc<dyn ClusterProvider>,
    launch_timeout: Duration,
}

impl ClusterController {
    pub fn new(provider: Arc<dyn ClusterProvider>, launch_timeout: Duration) -> Self {
        Self {
            provider,
            launch_timeout,
        }
    }

    /// Builds a descriptor and fills in the account facts
    pub async fn prepare(&self, config: &SubmitConfig) -> Result<ResourceDescriptor, ControllerError> {
        let mut descriptor = ResourceDescriptor::from_config(config)?;

        descriptor.ami_id = self
            .provider
            .ami_id()
            .await
            .map_err(|source| ControllerError::Lookup { what: "ami id", source })?;
        descriptor.account_id = self
            .provider
            .account_id()
            .await
            .map_err(|source| ControllerError::Lookup { what: "account id", source })?;
        descriptor.region = self
            .provider
            .region()
            .await
            .map_err(|source| ControllerError::Lookup { what: "region", source })?;

        info!(
            "Prepared {}: {} job(s), candidates {:?}, region {}",
            descriptor.cluster_name,
            descriptor.task_count(),
            descriptor.instance_types,
            descriptor.region
        );

        Ok(descriptor)
    }

    /// Creates the shared resources of a batch
    ///
    /// Handles are written into `descriptor` as soon as each resource exists,
    /// so a failed provisioning can still be cleaned up from it.
    pub async fn provision_cluster(
        &self,
        descriptor: &mut ResourceDescriptor,
        task_dir: &Path,
    ) -> Result<(), ControllerError> {
        if descriptor.key_ownership.is_owned() {
            let material_path = task_dir
                .join(CONF_DIR)
                .join(format!("{}.pem", descriptor.key_name));
            descriptor.key_name = self
                .create(ResourceSpec::KeyPair {
                    name: descriptor.key_name.clone(),
                    material_path,
                })
                .await?;
        }

        if descriptor.security_group_ownership.is_owned() {
            descriptor.security_group_id = self
                .create(ResourceSpec::SecurityGroup {
                    name: descriptor.cluster_name.clone(),
                })
                .await?;
        }

        descriptor.cluster_arn = self
            .create(ResourceSpec::Cluster {
                name: descriptor.cluster_name.clone(),
            })
            .await?;

        descriptor.task_definition_arn = self
            .create(ResourceSpec::TaskDefinition {
                family: descriptor.cluster_name.clone(),
                image: container_image(descriptor),
                vcpu: descriptor.task_vcpu,
                memory: descriptor.task_memory,
                log_group: descriptor.log_group_name.clone(),
                region: descriptor.region.clone(),
            })
            .await?;

        info!("Provisioned cluster {}", descriptor.cluster_arn);
        Ok(())
    }

    async fn create(&self, spec: ResourceSpec) -> Result<String, ControllerError> {
        let kind = spec.kind();
        let handle = self
            .provider
            .create(&spec)
            .await
            .map_err(|source| ControllerError::Provision { kind, source })?;

        debug!("Created {} {}", kind, handle);
        Ok(handle)
    }

    /// Launch parameters of job `job_index`
    pub fn capacity_spec(&self, descriptor: &ResourceDescriptor, job_index: usize) -> CapacitySpec {
        CapacitySpec {
            job_index,
            cluster_name: descriptor.cluster_name.clone(),
            ami_id: descriptor.ami_id.clone(),
            key_name: descriptor.key_name.clone(),
            security_group_id: descriptor.security_group_id.clone(),
            subnet_id: descriptor.subnet_id.clone(),
            disk_size: descriptor.disk_size,
            launch_timeout: self.launch_timeout,
        }
    }

    /// Launches the instance of one job
    ///
    /// Spot jobs try spot capacity first and, with `retry_on_demand`, fall
    /// back to on-demand for this job only. On-demand tries each candidate in
    /// order. The granted type and prices are written into `request`.
    /// Returns `None` when every attempt failed.
    pub async fn launch_job(
        &self,
        request: &mut ResourceRequest,
        candidates: &[String],
        retry_on_demand: bool,
        spec: &CapacitySpec,
    ) -> Option<LaunchResult> {
        let index = spec.job_index;

        if request.use_spot {
            match self
                .attempt(spec, self.provider.launch_spot(candidates, spec))
                .await
            {
                Ok(launch) => {
                    request.instance_type = launch.instance_type.clone();
                    request.spot_az = launch.availability_zone.clone();
                    request.spot_price = launch.hourly_price;
                    request.od_price = self.sample_on_demand_price(&launch.instance_type).await;

                    info!(
                        "Job {}: spot {} in {} at {:.4} USD/h",
                        index, launch.instance_type, launch.availability_zone, launch.hourly_price
                    );
                    return Some(launch);
                }
                Err(e) if retry_on_demand => {
                    warn!("Job {}: spot launch failed, retrying on-demand: {}", index, e);
                    request.use_spot = false;
                }
                Err(e) => {
                    warn!("Job {}: spot launch failed: {}", index, e);
                    return None;
                }
            }
        }

        for candidate in candidates {
            match self
                .attempt(spec, self.provider.launch_on_demand(candidate, spec))
                .await
            {
                Ok(launch) => {
                    request.instance_type = launch.instance_type.clone();
                    request.od_price = launch.hourly_price;

                    info!(
                        "Job {}: on-demand {} at {:.4} USD/h",
                        index, launch.instance_type, launch.hourly_price
                    );
                    return Some(launch);
                }
                Err(e) => {
                    warn!("Job {}: on-demand {} failed: {}", index, candidate, e);
                }
            }
        }

        warn!("Job {}: no candidate instance type could be launched", index);
        None
    }

    /// Runs one launch attempt under the job's deadline
    ///
    /// An expired attempt is abandoned and any instance it left behind is
    /// terminated before the next attempt starts.
    async fn attempt<F>(&self, spec: &CapacitySpec, launch: F) -> Result<LaunchResult, ProviderError>
    where
        F: Future<Output = Result<LaunchResult, ProviderError>>,
    {
        match tokio::time::timeout(spec.launch_timeout, launch).await {
            Ok(result) => result,
            Err(_) => {
                if let Err(e) = self.provider.terminate_job_instances(spec).await {
                    warn!(
                        "Job {}: failed to terminate instances of an abandoned launch: {}",
                        spec.job_index, e
                    );
                }
                Err(ProviderError::Timeout(spec.launch_timeout))
            }
        }
    }

    async fn sample_on_demand_price(&self, instance_type: &str) -> f64 {
        match self.provider.on_demand_price(instance_type).await {
            Ok(price) => price,
            Err(e) => {
                warn!("On-demand price of {} unavailable: {}", instance_type, e);
                0.0
            }
        }
    }

    /// Terminates a job's instance, logging instead of failing
    pub async fn release_instance(&self, instance_id: &str) {
        let id = ResourceId::Instance(instance_id.to_string());
        if let Err(e) = self.provider.terminate(&id).await {
            warn!("Failed to terminate {}: {}", id, e);
        }
    }

    /// Releases the shared resources of a batch
    ///
    /// Order: task definition, cluster, security group, key pair. Resources
    /// supplied by the caller are skipped. A failure never stops the
    /// remaining releases.
    pub async fn clean_up(&self, descriptor: &ResourceDescriptor) -> CleanupReport {
        let mut report = CleanupReport::default();

        self.release(
            &mut report,
            ResourceId::TaskDefinition(descriptor.task_definition_arn.clone()),
            Ownership::Owned,
        )
        .await;

        let cluster = if descriptor.cluster_arn.is_empty() {
            descriptor.cluster_name.clone()
        } else {
            descriptor.cluster_arn.clone()
        };
        self.release(&mut report, ResourceId::Cluster(cluster), Ownership::Owned)
            .await;

        self.release(
            &mut report,
            ResourceId::SecurityGroup(descriptor.security_group_id.clone()),
            descriptor.security_group_ownership,
        )
        .await;

        self.release(
            &mut report,
            ResourceId::KeyPair(descriptor.key_name.clone()),
            descriptor.key_ownership,
        )
        .await;

        if report.is_clean() {
            info!("Cleaned up {}", descriptor.cluster_name);
        } else {
            warn!("Resources of {} were left behind", descriptor.cluster_name);
        }

        report
    }

    async fn release(&self, report: &mut CleanupReport, id: ResourceId, ownership: Ownership) {
        let kind = id.kind();

        if !ownership.is_owned() {
            debug!("Skipping external {}", id);
            report.record(kind, id.handle(), CleanupOutcome::SkippedExternal);
            return;
        }

        if id.handle().is_empty() {
            debug!("No {} to release", kind);
            report.record(kind, "", CleanupOutcome::SkippedNoHandle);
            return;
        }

        let outcome = match self.provider.terminate(&id).await {
            Ok(()) => {
                info!("Released {}", id);
                CleanupOutcome::Released
            }
            Err(ProviderError::NotFound(msg)) => {
                warn!("{} already absent: {}", id, msg);
                CleanupOutcome::NotFound
            }
            Err(ProviderError::InUse(msg)) => {
                warn!("{} is still in use: {}", id, msg);
                CleanupOutcome::InUse(msg)
            }
            Err(e) => {
                warn!("Failed to release {}: {}", id, e);
                CleanupOutcome::Failed(e.to_string())
            }
        };

        report.record(kind, id.handle(), outcome);
    }
}

/// Image reference the task definition runs
///
/// Images pulled from the account's own registry are qualified with the
/// registry host.
pub fn container_image(descriptor: &ResourceDescriptor) -> String {
    if descriptor.use_amazon_ecr {
        format!(
            "{}.dkr.ecr.{}.amazonaws.com/{}",
            descriptor.account_id, descriptor.region, descriptor.image
        )
    } else {
        descriptor.image.clone()
    }
}
