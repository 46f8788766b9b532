//! Request and response types exchanged with a cluster provider

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Everything an instance launch needs besides its instance type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacitySpec {
    /// Index of the job the instance is launched for
    pub job_index: usize,
    pub cluster_name: String,
    pub ami_id: String,
    pub key_name: String,
    pub security_group_id: String,
    /// Empty lets the provider pick a subnet
    pub subnet_id: String,
    pub disk_size: u32,
    /// Deadline of a single launch attempt
    pub launch_timeout: Duration,
}

/// An instance granted by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchResult {
    pub instance_id: String,
    /// The type actually granted, which may differ from the first candidate
    pub instance_type: String,
    pub availability_zone: String,
    /// Hourly price of the granted purchasing option
    pub hourly_price: f64,
}

/// Kinds of shared resources a cluster allocation consists of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    TaskDefinition,
    Cluster,
    SecurityGroup,
    KeyPair,
    Instance,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::TaskDefinition => write!(f, "task definition"),
            ResourceKind::Cluster => write!(f, "cluster"),
            ResourceKind::SecurityGroup => write!(f, "security group"),
            ResourceKind::KeyPair => write!(f, "key pair"),
            ResourceKind::Instance => write!(f, "instance"),
        }
    }
}

/// Handle of an existing resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceId {
    TaskDefinition(String),
    Cluster(String),
    SecurityGroup(String),
    KeyPair(String),
    Instance(String),
}

impl ResourceId {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceId::TaskDefinition(_) => ResourceKind::TaskDefinition,
            ResourceId::Cluster(_) => ResourceKind::Cluster,
            ResourceId::SecurityGroup(_) => ResourceKind::SecurityGroup,
            ResourceId::KeyPair(_) => ResourceKind::KeyPair,
            ResourceId::Instance(_) => ResourceKind::Instance,
        }
    }

    pub fn handle(&self) -> &str {
        match self {
            ResourceId::TaskDefinition(h)
            | ResourceId::Cluster(h)
            | ResourceId::SecurityGroup(h)
            | ResourceId::KeyPair(h)
            | ResourceId::Instance(h) => h,
        }
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind(), self.handle())
    }
}

/// Definition of a shared resource to create before jobs are launched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResourceSpec {
    KeyPair {
        name: String,
        /// Where the private key material is written
        material_path: PathBuf,
    },
    SecurityGroup {
        name: String,
    },
    Cluster {
        name: String,
    },
    TaskDefinition {
        family: String,
        image: String,
        vcpu: u32,
        memory: u32,
        log_group: String,
        region: String,
    },
}

impl ResourceSpec {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSpec::KeyPair { .. } => ResourceKind::KeyPair,
            ResourceSpec::SecurityGroup { .. } => ResourceKind::SecurityGroup,
            ResourceSpec::Cluster { .. } => ResourceKind::Cluster,
            ResourceSpec::TaskDefinition { .. } => ResourceKind::TaskDefinition,
        }
    }
}
