//! ecsub Cluster Provider
//!
//! The interface through which ecsub reaches the cloud: launching spot and
//! on-demand instances, creating and releasing the shared cluster resources,
//! and looking up account facts.
//!
//! [`AwsCliProvider`] implements it on top of the `aws` command line tool.
//! Tests and alternative backends implement [`ClusterProvider`] directly.

mod aws_cli;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use aws_cli::AwsCliProvider;
pub use error::{ProviderError, Result};
pub use types::{CapacitySpec, LaunchResult, ResourceId, ResourceKind, ResourceSpec};

use async_trait::async_trait;

/// Cloud capability used by the cluster controller
///
/// Implementations must be safe to call from concurrently running job tasks.
#[async_trait]
pub trait ClusterProvider: Send + Sync {
    /// Launches an on-demand instance of exactly `instance_type`
    ///
    /// Fails with [`ProviderError::NoCapacity`] when the type is unavailable.
    async fn launch_on_demand(&self, instance_type: &str, spec: &CapacitySpec) -> Result<LaunchResult>;

    /// Launches a spot instance, trying `candidates` in order
    ///
    /// Fails with [`ProviderError::NoCapacity`] when no candidate yields spot
    /// capacity.
    async fn launch_spot(&self, candidates: &[String], spec: &CapacitySpec) -> Result<LaunchResult>;

    /// Terminates every live instance launched for `spec`'s job
    ///
    /// Called after a launch attempt missed its deadline, since the abandoned
    /// request may still bring an instance up.
    async fn terminate_job_instances(&self, spec: &CapacitySpec) -> Result<()>;

    /// Current on-demand hourly price of an instance type
    async fn on_demand_price(&self, instance_type: &str) -> Result<f64>;

    /// Creates a shared resource and returns its handle
    async fn create(&self, resource: &ResourceSpec) -> Result<String>;

    /// Releases a resource
    ///
    /// Fails with [`ProviderError::NotFound`] if it is already gone and with
    /// [`ProviderError::InUse`] if a dependent resource blocks deletion.
    async fn terminate(&self, resource: &ResourceId) -> Result<()>;

    /// Machine image instances are launched from
    async fn ami_id(&self) -> Result<String>;

    async fn account_id(&self) -> Result<String>;

    async fn region(&self) -> Result<String>;
}
