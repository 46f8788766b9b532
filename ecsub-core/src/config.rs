//! Submission configuration
//!
//! The typed settings a submission is built from, plus the named defaults
//! applied when a [`ResourceDescriptor`](crate::domain::resource::ResourceDescriptor)
//! is constructed.

use std::path::PathBuf;

use crate::error::ConfigError;

/// Default vCPU units reserved per ECS task
pub const DEFAULT_TASK_VCPU: u32 = 1;

/// Default memory (MiB) reserved per ECS task
pub const DEFAULT_TASK_MEMORY_MIB: u32 = 300;

/// Default root disk size (GiB) of each instance
pub const DEFAULT_DISK_SIZE_GIB: u32 = 22;

/// Prefix of the log group created for a cluster
pub const LOG_GROUP_PREFIX: &str = "ecsub-";

/// Command run inside the container before the user script
pub const DEFAULT_SETUP_CONTAINER_CMD: &str =
    "apt update; apt install -y python-pip; pip install awscli --upgrade; aws configure list";

/// Default shell used to run the task script
pub const DEFAULT_SHELL: &str = "/bin/bash";

/// Settings of a single job submission
#[derive(Debug, Clone)]
pub struct SubmitConfig {
    /// Output directory; the run lives under `wdir/task_name`
    pub wdir: PathBuf,

    pub task_name: String,

    /// Cluster name; generated from the task name when empty
    pub cluster_name: String,

    /// Number of jobs in the batch
    pub task_count: usize,

    pub image: String,
    pub use_amazon_ecr: bool,
    pub shell: String,

    /// Scalar instance type used when the candidate list is empty
    pub instance_type: String,

    /// Ordered candidate instance types; `[""]` means "not given"
    pub instance_type_list: Vec<String>,

    pub disk_size: u32,
    pub task_vcpu: Option<u32>,
    pub task_memory: Option<u32>,

    /// Caller-supplied key pair; empty means one is generated
    pub key_name: String,

    /// Caller-supplied security group; empty means one is created
    pub security_group_id: String,

    pub subnet_id: String,

    pub spot: bool,
    pub retry_on_demand: bool,

    /// Empty means [`DEFAULT_SETUP_CONTAINER_CMD`]
    pub setup_container_cmd: String,
    pub dind: bool,

    /// Upper bound on concurrently launched jobs
    pub processes: usize,

    /// Accounts billed for requester-pays bucket access
    pub request_payer: Vec<String>,
}

impl SubmitConfig {
    /// Creates a configuration with defaults for everything but the identity
    pub fn new(wdir: impl Into<PathBuf>, task_name: impl Into<String>, task_count: usize) -> Self {
        Self {
            wdir: wdir.into(),
            task_name: task_name.into(),
            cluster_name: String::new(),
            task_count,
            image: String::new(),
            use_amazon_ecr: false,
            shell: DEFAULT_SHELL.to_string(),
            instance_type: String::new(),
            instance_type_list: vec![String::new()],
            disk_size: DEFAULT_DISK_SIZE_GIB,
            task_vcpu: None,
            task_memory: None,
            key_name: String::new(),
            security_group_id: String::new(),
            subnet_id: String::new(),
            spot: false,
            retry_on_demand: false,
            setup_container_cmd: String::new(),
            dind: false,
            processes: 20,
            request_payer: Vec::new(),
        }
    }

    /// Directory holding this task's run: `wdir/task_name`
    pub fn task_dir(&self) -> PathBuf {
        self.wdir.join(&self.task_name)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.task_name.is_empty() {
            return Err(ConfigError::Missing("task_name"));
        }

        if self.task_count == 0 {
            return Err(ConfigError::invalid("task_count", "must be greater than 0"));
        }

        if self.processes == 0 {
            return Err(ConfigError::invalid("processes", "must be greater than 0"));
        }

        if self.disk_size == 0 {
            return Err(ConfigError::invalid("disk_size", "must be greater than 0"));
        }

        Ok(())
    }
}
