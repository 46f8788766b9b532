//! Resource descriptor domain types
//!
//! Describes the cluster resources a batch needs, and the per-job capacity
//! requests that are filled in while jobs are launched.

use serde::{Deserialize, Serialize};

use crate::config::{
    DEFAULT_SETUP_CONTAINER_CMD, DEFAULT_TASK_MEMORY_MIB, DEFAULT_TASK_VCPU, LOG_GROUP_PREFIX,
    SubmitConfig,
};
use crate::domain::summary::RunSummary;
use crate::error::ConfigError;

/// Who created a resource, and therefore who may delete it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Ownership {
    /// Created by ecsub; released on cleanup
    Owned,

    /// Supplied by the caller; never deleted
    #[default]
    External,
}

impl Ownership {
    /// Maps the persisted `Auto*` flags onto an ownership tag
    pub fn from_auto_flag(auto: bool) -> Self {
        if auto { Self::Owned } else { Self::External }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, Self::Owned)
    }
}

/// Capacity request of a single job
///
/// Starts with the batch-level spot flag and zero prices; the controller
/// records what was actually granted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub use_spot: bool,
    pub instance_type: String,
    pub od_price: f64,
    pub spot_az: String,
    pub spot_price: f64,
}

impl ResourceRequest {
    pub fn new(use_spot: bool, instance_type: impl Into<String>) -> Self {
        Self {
            use_spot,
            instance_type: instance_type.into(),
            od_price: 0.0,
            spot_az: String::new(),
            spot_price: 0.0,
        }
    }
}

/// A provisioned (or about to be provisioned) cluster allocation
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    pub cluster_name: String,
    pub cluster_arn: String,
    pub task_definition_arn: String,
    pub key_name: String,
    pub key_ownership: Ownership,
    pub security_group_id: String,
    pub security_group_ownership: Ownership,
    pub subnet_id: String,
    pub ami_id: String,
    pub log_group_name: String,
    pub account_id: String,
    pub region: String,

    /// Ordered candidate instance types, never empty once built
    pub instance_types: Vec<String>,
    pub disk_size: u32,
    pub task_vcpu: u32,
    pub task_memory: u32,
    pub image: String,
    pub use_amazon_ecr: bool,
    pub shell: String,
    pub setup_container_cmd: String,
    pub dind: bool,

    pub use_spot: bool,
    pub retry_on_demand: bool,

    pub request_payer: Vec<String>,

    /// One entry per job index
    pub job_requests: Vec<ResourceRequest>,
}

impl ResourceDescriptor {
    /// Builds a descriptor for a new submission
    ///
    /// Normalizes the candidate instance types, applies the named defaults and
    /// creates one resource request per task.
    pub fn from_config(config: &SubmitConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let instance_types = normalize_instance_types(&config.instance_type_list, &config.instance_type)?;

        let cluster_name = if config.cluster_name.is_empty() {
            generate_cluster_name(&config.task_name)
        } else {
            config.cluster_name.clone()
        };

        let (key_name, key_ownership) = if config.key_name.is_empty() {
            (cluster_name.clone(), Ownership::Owned)
        } else {
            (config.key_name.clone(), Ownership::External)
        };

        let security_group_ownership = if config.security_group_id.is_empty() {
            Ownership::Owned
        } else {
            Ownership::External
        };

        let setup_container_cmd = if config.setup_container_cmd.is_empty() {
            DEFAULT_SETUP_CONTAINER_CMD.to_string()
        } else {
            config.setup_container_cmd.clone()
        };

        let job_requests = (0..config.task_count)
            .map(|_| ResourceRequest::new(config.spot, config.instance_type.clone()))
            .collect();

        Ok(Self {
            log_group_name: format!("{}{}", LOG_GROUP_PREFIX, cluster_name),
            cluster_name,
            cluster_arn: String::new(),
            task_definition_arn: String::new(),
            key_name,
            key_ownership,
            security_group_id: config.security_group_id.clone(),
            security_group_ownership,
            subnet_id: config.subnet_id.clone(),
            ami_id: String::new(),
            account_id: String::new(),
            region: String::new(),
            instance_types,
            disk_size: config.disk_size,
            task_vcpu: config.task_vcpu.unwrap_or(DEFAULT_TASK_VCPU),
            task_memory: config.task_memory.unwrap_or(DEFAULT_TASK_MEMORY_MIB),
            image: config.image.clone(),
            use_amazon_ecr: config.use_amazon_ecr,
            shell: config.shell.clone(),
            setup_container_cmd,
            dind: config.dind,
            use_spot: config.spot,
            retry_on_demand: config.retry_on_demand,
            request_payer: config.request_payer.clone(),
            job_requests,
        })
    }

    /// Rebuilds the identity part of a descriptor from a persisted summary
    ///
    /// Only used for cleanup: capacity and per-job fields stay empty.
    pub fn from_summary(summary: &RunSummary) -> Self {
        Self {
            cluster_name: summary.cluster_name.clone(),
            cluster_arn: summary.cluster_arn.clone(),
            task_definition_arn: summary.task_definition_arn.clone(),
            key_name: summary.key_name.clone(),
            key_ownership: Ownership::from_auto_flag(summary.auto_key),
            security_group_id: summary.security_group_id.clone(),
            security_group_ownership: Ownership::from_auto_flag(summary.auto_security_group),
            subnet_id: String::new(),
            ami_id: summary.ami_id.clone(),
            log_group_name: format!("{}{}", LOG_GROUP_PREFIX, summary.cluster_name),
            account_id: String::new(),
            region: String::new(),
            instance_types: vec![String::new()],
            disk_size: summary.disk_size,
            task_vcpu: summary.task_vcpu,
            task_memory: summary.task_memory,
            image: summary.image.clone(),
            use_amazon_ecr: summary.use_amazon_ecr,
            shell: summary.shell.clone(),
            setup_container_cmd: String::new(),
            dind: false,
            use_spot: summary.spot,
            retry_on_demand: false,
            request_payer: Vec::new(),
            job_requests: Vec::new(),
        }
    }

    pub fn task_count(&self) -> usize {
        self.job_requests.len()
    }
}

/// Collapses the "not given" sentinel list onto the scalar instance type
fn normalize_instance_types(list: &[String], scalar: &str) -> Result<Vec<String>, ConfigError> {
    let given: Vec<String> = list
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();

    if !given.is_empty() {
        return Ok(given);
    }

    if scalar.trim().is_empty() {
        return Err(ConfigError::Missing("instance_type"));
    }

    Ok(vec![scalar.trim().to_string()])
}

fn generate_cluster_name(task_name: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", task_name, &suffix[..8])
}
