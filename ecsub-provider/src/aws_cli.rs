//! AWS command line provider
//!
//! Implements [`ClusterProvider`] by invoking the `aws` CLI:
//! - EC2 for instances, key pairs and security groups
//! - ECS for clusters and task definitions
//! - SSM, STS and the pricing API for account facts and prices
//!
//! Responses are requested as JSON and picked apart with JSON pointers.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, Result};
use crate::types::{CapacitySpec, LaunchResult, ResourceId, ResourceSpec};
use crate::ClusterProvider;

/// SSM parameter holding the current ECS-optimized machine image
const ECS_AMI_PARAMETER: &str = "/aws/service/ecs/optimized-ami/amazon-linux-2/recommended/image_id";

/// The pricing API is only served from a few regions
const PRICING_REGION: &str = "us-east-1";

const PRODUCT_DESCRIPTION: &str = "Linux/UNIX";

/// Stderr fragments meaning "no capacity right now"
const NO_CAPACITY_MARKERS: &[&str] = &[
    "InsufficientInstanceCapacity",
    "InsufficientCapacity",
    "SpotMaxPriceTooLow",
    "MaxSpotInstanceCountExceeded",
    "capacity-not-available",
    "(Unsupported)",
];

const NOT_FOUND_MARKERS: &[&str] = &[".NotFound", "NotFoundException", "does not exist"];

const IN_USE_MARKERS: &[&str] = &[
    "DependencyViolation",
    "InUse",
    "ClusterContainsContainerInstancesException",
    "ClusterContainsTasksException",
];

/// How an instance is purchased
#[derive(Debug, Clone, PartialEq)]
enum Market<'a> {
    OnDemand,
    Spot { availability_zone: &'a str },
}

/// Cluster provider backed by the `aws` CLI
#[derive(Debug, Clone)]
pub struct AwsCliProvider {
    binary: String,
    region: Option<String>,
    instance_profile: String,
}

impl AwsCliProvider {
    /// Creates a provider using `aws` from `PATH` and the CLI's configured region
    pub fn new() -> Self {
        Self {
            binary: "aws".to_string(),
            region: None,
            instance_profile: "ecsInstanceRole".to_string(),
        }
    }

    /// Pins every call to `region`
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Uses a different CLI executable
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// IAM instance profile attached to launched instances
    pub fn with_instance_profile(mut self, profile: impl Into<String>) -> Self {
        self.instance_profile = profile.into();
        self
    }

    /// Runs the CLI and returns its stdout
    async fn run(&self, args: &[String], region: Option<&str>) -> Result<String> {
        let mut command = Command::new(&self.binary);
        // A call abandoned at its deadline must not keep running
        command.args(args).kill_on_drop(true);

        if let Some(region) = region.or(self.region.as_deref()) {
            command.arg("--region").arg(region);
        }

        let command_line = format!("{} {}", self.binary, args.join(" "));
        debug!("Running {}", command_line);

        let output = command.output().await?;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !stderr.trim().is_empty() {
            debug!("{} stderr: {}", command_line, stderr.trim());
        }

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            return Err(classify_cli_error(&command_line, exit_code, stderr.trim()));
        }

        Ok(stdout)
    }

    /// Runs the CLI with JSON output and parses it
    async fn run_json(&self, args: &[String], region: Option<&str>) -> Result<Value> {
        let mut args = args.to_vec();
        args.extend(["--output".to_string(), "json".to_string()]);

        let stdout = self.run(&args, region).await?;
        if stdout.trim().is_empty() {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_str(&stdout)?)
    }

    async fn run_instance(
        &self,
        instance_type: &str,
        spec: &CapacitySpec,
        market: Market<'_>,
        hourly_price: f64,
    ) -> Result<LaunchResult> {
        let args = run_instances_args(instance_type, spec, &market, &self.instance_profile);
        let response = self.run_json(&args, None).await?;
        let launch = parse_launch(&response, instance_type, hourly_price)?;

        info!(
            "Launched {} instance {} ({}) in {} for job {}",
            match market {
                Market::OnDemand => "on-demand",
                Market::Spot { .. } => "spot",
            },
            launch.instance_id,
            launch.instance_type,
            launch.availability_zone,
            spec.job_index
        );

        Ok(launch)
    }

    async fn create_key_pair(&self, name: &str, material_path: &Path) -> Result<String> {
        let response = self
            .run_json(&args(&["ec2", "create-key-pair", "--key-name", name]), None)
            .await?;
        let material = json_str(&response, "/KeyMaterial")?;

        if let Some(parent) = material_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(material_path, material).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(material_path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        json_str(&response, "/KeyName")
    }

    async fn create_log_group(&self, log_group: &str) -> Result<()> {
        match self
            .run(&args(&["logs", "create-log-group", "--log-group-name", log_group]), None)
            .await
        {
            Err(ProviderError::CommandFailed { stderr, .. })
                if stderr.contains("ResourceAlreadyExistsException") =>
            {
                debug!("Log group {} already exists", log_group);
                Ok(())
            }
            other => other.map(|_| ()),
        }
    }
}

impl Default for AwsCliProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClusterProvider for AwsCliProvider {
    async fn launch_on_demand(&self, instance_type: &str, spec: &CapacitySpec) -> Result<LaunchResult> {
        let price = self.on_demand_price(instance_type).await?;
        self.run_instance(instance_type, spec, Market::OnDemand, price).await
    }

    async fn launch_spot(&self, candidates: &[String], spec: &CapacitySpec) -> Result<LaunchResult> {
        for candidate in candidates {
            let history = self
                .run_json(
                    &args(&[
                        "ec2",
                        "describe-spot-price-history",
                        "--instance-types",
                        candidate,
                        "--product-descriptions",
                        PRODUCT_DESCRIPTION,
                        "--max-items",
                        "50",
                    ]),
                    None,
                )
                .await?;

            let Some((availability_zone, price)) = cheapest_spot_offer(&history) else {
                debug!("No spot offer for {}", candidate);
                continue;
            };

            match self
                .run_instance(candidate, spec, Market::Spot { availability_zone: &availability_zone }, price)
                .await
            {
                Ok(launch) => return Ok(launch),
                Err(e) if e.is_no_capacity() => {
                    warn!("Spot capacity for {} unavailable: {}", candidate, e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(ProviderError::NoCapacity(format!(
            "no spot capacity for {}",
            candidates.join(", ")
        )))
    }

    async fn terminate_job_instances(&self, spec: &CapacitySpec) -> Result<()> {
        let response = self
            .run_json(
                &args(&[
                    "ec2",
                    "describe-instances",
                    "--filters",
                    &format!("Name=tag:Name,Values={}", job_instance_name(spec)),
                    "Name=instance-state-name,Values=pending,running",
                ]),
                None,
            )
            .await?;

        let ids = instance_ids(&response);
        if ids.is_empty() {
            debug!("No live instance left for job {}", spec.job_index);
            return Ok(());
        }

        let mut command = args(&["ec2", "terminate-instances", "--instance-ids"]);
        command.extend(ids.iter().cloned());
        self.run(&command, None).await?;

        warn!(
            "Terminated abandoned instance(s) {} of job {}",
            ids.join(", "),
            spec.job_index
        );
        Ok(())
    }

    async fn on_demand_price(&self, instance_type: &str) -> Result<f64> {
        let region = self.region().await?;
        let filter = |field: &str, value: &str| format!("Type=TERM_MATCH,Field={},Value={}", field, value);

        let response = self
            .run_json(
                &[
                    "pricing".to_string(),
                    "get-products".to_string(),
                    "--service-code".to_string(),
                    "AmazonEC2".to_string(),
                    "--filters".to_string(),
                    filter("instanceType", instance_type),
                    filter("regionCode", &region),
                    filter("operatingSystem", "Linux"),
                    filter("tenancy", "Shared"),
                    filter("preInstalledSw", "NA"),
                    filter("capacitystatus", "Used"),
                ],
                Some(PRICING_REGION),
            )
            .await?;

        parse_on_demand_price(&response)
    }

    async fn create(&self, resource: &ResourceSpec) -> Result<String> {
        let handle = match resource {
            ResourceSpec::KeyPair { name, material_path } => {
                self.create_key_pair(name, material_path).await?
            }
            ResourceSpec::SecurityGroup { name } => {
                let response = self
                    .run_json(
                        &args(&[
                            "ec2",
                            "create-security-group",
                            "--group-name",
                            name,
                            "--description",
                            "Security group created by ecsub",
                        ]),
                        None,
                    )
                    .await?;
                json_str(&response, "/GroupId")?
            }
            ResourceSpec::Cluster { name } => {
                let response = self
                    .run_json(&args(&["ecs", "create-cluster", "--cluster-name", name]), None)
                    .await?;
                json_str(&response, "/cluster/clusterArn")?
            }
            ResourceSpec::TaskDefinition { log_group, .. } => {
                self.create_log_group(log_group).await?;
                let definition = task_definition_json(resource);
                let response = self
                    .run_json(
                        &args(&[
                            "ecs",
                            "register-task-definition",
                            "--cli-input-json",
                            &definition.to_string(),
                        ]),
                        None,
                    )
                    .await?;
                json_str(&response, "/taskDefinition/taskDefinitionArn")?
            }
        };

        info!("Created {}: {}", resource.kind(), handle);
        Ok(handle)
    }

    async fn terminate(&self, resource: &ResourceId) -> Result<()> {
        let command = match resource {
            ResourceId::TaskDefinition(arn) => {
                args(&["ecs", "deregister-task-definition", "--task-definition", arn])
            }
            ResourceId::Cluster(arn) => args(&["ecs", "delete-cluster", "--cluster", arn]),
            ResourceId::SecurityGroup(id) => args(&["ec2", "delete-security-group", "--group-id", id]),
            ResourceId::KeyPair(name) => args(&["ec2", "delete-key-pair", "--key-name", name]),
            ResourceId::Instance(id) => args(&["ec2", "terminate-instances", "--instance-ids", id]),
        };

        self.run(&command, None).await?;
        info!("Released {}", resource);
        Ok(())
    }

    async fn ami_id(&self) -> Result<String> {
        let response = self
            .run_json(&args(&["ssm", "get-parameters", "--names", ECS_AMI_PARAMETER]), None)
            .await?;

        json_str(&response, "/Parameters/0/Value")
            .map_err(|_| ProviderError::NotFound(format!("SSM parameter {}", ECS_AMI_PARAMETER)))
    }

    async fn account_id(&self) -> Result<String> {
        let response = self.run_json(&args(&["sts", "get-caller-identity"]), None).await?;
        json_str(&response, "/Account")
    }

    async fn region(&self) -> Result<String> {
        if let Some(region) = &self.region {
            return Ok(region.clone());
        }

        let stdout = self.run(&args(&["configure", "get", "region"]), None).await?;
        let region = stdout.trim();
        if region.is_empty() {
            return Err(ProviderError::Parse("no default region configured".to_string()));
        }

        Ok(region.to_string())
    }
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

fn json_str(value: &Value, pointer: &str) -> Result<String> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ProviderError::Parse(format!("missing string at {}", pointer)))
}

/// Maps a failed CLI call onto the provider error taxonomy
fn classify_cli_error(command: &str, exit_code: i32, stderr: &str) -> ProviderError {
    let contains_any = |markers: &[&str]| markers.iter().any(|m| stderr.contains(m));

    if contains_any(NO_CAPACITY_MARKERS) {
        ProviderError::NoCapacity(stderr.to_string())
    } else if contains_any(NOT_FOUND_MARKERS) {
        ProviderError::NotFound(stderr.to_string())
    } else if contains_any(IN_USE_MARKERS) {
        ProviderError::InUse(stderr.to_string())
    } else {
        ProviderError::CommandFailed {
            command: command.to_string(),
            exit_code,
            stderr: stderr.to_string(),
        }
    }
}

fn run_instances_args(
    instance_type: &str,
    spec: &CapacitySpec,
    market: &Market<'_>,
    instance_profile: &str,
) -> Vec<String> {
    let user_data = format!(
        "#!/bin/bash\necho ECS_CLUSTER={} >> /etc/ecs/ecs.config\n",
        spec.cluster_name
    );
    let block_devices = json!([{
        "DeviceName": "/dev/xvdcz",
        "Ebs": { "VolumeSize": spec.disk_size, "VolumeType": "gp2", "DeleteOnTermination": true }
    }]);

    let mut args = args(&[
        "ec2",
        "run-instances",
        "--image-id",
        &spec.ami_id,
        "--instance-type",
        instance_type,
        "--key-name",
        &spec.key_name,
        "--security-group-ids",
        &spec.security_group_id,
        "--count",
        "1",
        "--iam-instance-profile",
        &format!("Name={}", instance_profile),
        "--user-data",
        &user_data,
        "--block-device-mappings",
        &block_devices.to_string(),
        "--tag-specifications",
        &format!(
            "ResourceType=instance,Tags=[{{Key=Name,Value={}}}]",
            job_instance_name(spec)
        ),
    ]);

    if !spec.subnet_id.is_empty() {
        args.extend(["--subnet-id".to_string(), spec.subnet_id.clone()]);
    }

    if let Market::Spot { availability_zone } = market {
        args.extend([
            "--instance-market-options".to_string(),
            json!({ "MarketType": "spot" }).to_string(),
            "--placement".to_string(),
            format!("AvailabilityZone={}", availability_zone),
        ]);
    }

    args
}

/// Name tag carried by the instances of one job: `<cluster>-<index>`
fn job_instance_name(spec: &CapacitySpec) -> String {
    format!("{}-{}", spec.cluster_name, spec.job_index)
}

/// Instance ids of a `describe-instances` response
fn instance_ids(response: &Value) -> Vec<String> {
    response
        .get("Reservations")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|reservation| reservation.get("Instances")?.as_array())
        .flatten()
        .filter_map(|instance| instance.get("InstanceId")?.as_str())
        .map(str::to_string)
        .collect()
}

fn parse_launch(response: &Value, instance_type: &str, hourly_price: f64) -> Result<LaunchResult> {
    Ok(LaunchResult {
        instance_id: json_str(response, "/Instances/0/InstanceId")?,
        instance_type: instance_type.to_string(),
        availability_zone: json_str(response, "/Instances/0/Placement/AvailabilityZone")?,
        hourly_price,
    })
}

/// Cheapest availability zone in a spot price history response
fn cheapest_spot_offer(history: &Value) -> Option<(String, f64)> {
    history
        .get("SpotPriceHistory")?
        .as_array()?
        .iter()
        .filter_map(|entry| {
            let zone = entry.get("AvailabilityZone")?.as_str()?;
            let price = entry.get("SpotPrice")?.as_str()?.parse::<f64>().ok()?;
            Some((zone.to_string(), price))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

/// On-demand USD price from a pricing API `get-products` response
fn parse_on_demand_price(response: &Value) -> Result<f64> {
    let product = response
        .pointer("/PriceList/0")
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::NotFound("no price list entry".to_string()))?;
    let product: Value = serde_json::from_str(product)?;

    let usd = product
        .pointer("/terms/OnDemand")
        .and_then(Value::as_object)
        .and_then(|terms| terms.values().next())
        .and_then(|term| term.get("priceDimensions"))
        .and_then(Value::as_object)
        .and_then(|dimensions| dimensions.values().next())
        .and_then(|dimension| dimension.pointer("/pricePerUnit/USD"))
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::Parse("price list entry has no USD price".to_string()))?;

    usd.parse()
        .map_err(|_| ProviderError::Parse(format!("invalid USD price {:?}", usd)))
}

fn task_definition_json(resource: &ResourceSpec) -> Value {
    let ResourceSpec::TaskDefinition {
        family,
        image,
        vcpu,
        memory,
        log_group,
        region,
    } = resource
    else {
        return Value::Null;
    };

    json!({
        "family": family,
        "containerDefinitions": [{
            "name": family,
            "image": image,
            "cpu": vcpu * 1024,
            "memory": memory,
            "essential": true,
            "entryPoint": ["ecsub_run.sh"],
            "logConfiguration": {
                "logDriver": "awslogs",
                "options": {
                    "awslogs-group": log_group,
                    "awslogs-region": region,
                    "awslogs-stream-prefix": "ecsub"
                }
            }
        }]
    })
}
