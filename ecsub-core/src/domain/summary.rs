//! Run summary domain types
//!
//! A run summary is the durable record of one submission round: the
//! identifiers needed to find the cluster resources again, and the per-job
//! timing and cost facts.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::job::JobResult;
use crate::domain::resource::ResourceDescriptor;

/// Directory (under the task directory) holding summaries and job logs
pub const LOG_DIR: &str = "log";

/// Persisted record of one submission round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(rename = "ClusterName")]
    pub cluster_name: String,

    /// Round number, monotonic per task directory
    #[serde(rename = "No")]
    pub round: u32,

    /// Task directory (`wdir/task_name`)
    #[serde(rename = "Wdir")]
    pub wdir: PathBuf,

    #[serde(rename = "Jobs")]
    pub jobs: Vec<JobResult>,

    #[serde(rename = "KeyName")]
    pub key_name: String,

    #[serde(rename = "SecurityGroupId")]
    pub security_group_id: String,

    #[serde(rename = "AmiId", default)]
    pub ami_id: String,

    #[serde(rename = "Shell")]
    pub shell: String,

    #[serde(rename = "EcsTaskVcpu")]
    pub task_vcpu: u32,

    #[serde(rename = "EcsTaskMemory")]
    pub task_memory: u32,

    #[serde(rename = "Ec2InstanceDiskSize")]
    pub disk_size: u32,

    #[serde(rename = "Image")]
    pub image: String,

    #[serde(rename = "UseAmazonEcr")]
    pub use_amazon_ecr: bool,

    #[serde(rename = "Spot")]
    pub spot: bool,

    #[serde(rename = "AutoKey")]
    pub auto_key: bool,

    /// Absent in summaries written before security groups were tracked
    #[serde(rename = "AutoSecurityGroup", default)]
    pub auto_security_group: bool,

    #[serde(rename = "ClusterArn")]
    pub cluster_arn: String,

    #[serde(rename = "TaskDefinitionAn")]
    pub task_definition_arn: String,
}

impl RunSummary {
    /// Assembles the summary of a finished round
    pub fn from_descriptor(
        descriptor: &ResourceDescriptor,
        wdir: impl Into<PathBuf>,
        round: u32,
        jobs: Vec<JobResult>,
    ) -> Self {
        Self {
            cluster_name: descriptor.cluster_name.clone(),
            round,
            wdir: wdir.into(),
            jobs,
            key_name: descriptor.key_name.clone(),
            security_group_id: descriptor.security_group_id.clone(),
            ami_id: descriptor.ami_id.clone(),
            shell: descriptor.shell.clone(),
            task_vcpu: descriptor.task_vcpu,
            task_memory: descriptor.task_memory,
            disk_size: descriptor.disk_size,
            image: descriptor.image.clone(),
            use_amazon_ecr: descriptor.use_amazon_ecr,
            spot: descriptor.use_spot,
            auto_key: descriptor.key_ownership.is_owned(),
            auto_security_group: descriptor.security_group_ownership.is_owned(),
            cluster_arn: descriptor.cluster_arn.clone(),
            task_definition_arn: descriptor.task_definition_arn.clone(),
        }
    }

    /// Location of this round's summary file
    pub fn path(&self) -> PathBuf {
        summary_path(&self.wdir, self.round)
    }

    /// Serializes with sorted keys and 4-space indentation
    ///
    /// The output is byte-stable: re-serializing a loaded summary yields the
    /// same bytes.
    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        // serde_json's map is ordered by key, which gives the stable ordering
        let value = serde_json::to_value(self)?;

        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        value.serialize(&mut serializer)?;

        Ok(out)
    }

    pub fn from_json_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// File name of a round's summary: `summary.001.log`
pub fn summary_file_name(round: u32) -> String {
    format!("summary.{:03}.log", round)
}

/// `<task_dir>/log/summary.<round>.log`
pub fn summary_path(task_dir: &Path, round: u32) -> PathBuf {
    task_dir.join(LOG_DIR).join(summary_file_name(round))
}

/// Extracts the round number from a summary file name
pub fn parse_summary_file_name(name: &str) -> Option<u32> {
    name.strip_prefix("summary.")?
        .strip_suffix(".log")?
        .parse()
        .ok()
}

/// Whether a file name matches `summary.*.log`
pub fn is_summary_file_name(name: &str) -> bool {
    name.len() >= "summary..log".len() && name.starts_with("summary.") && name.ends_with(".log")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resource::Ownership;
    use crate::timefmt::parse_standard_format;

    const PERSISTED: &str = r#"{
    "AutoKey": true,
    "ClusterArn": "arn:aws:ecs:us-east-1:123456789012:cluster/jobA-0001",
    "ClusterName": "jobA-0001",
    "Ec2InstanceDiskSize": 22,
    "EcsTaskMemory": 300,
    "EcsTaskVcpu": 1,
    "Image": "python:3.7",
    "Jobs": [
        {
            "Ec2InstanceType": "m5.large",
            "End": "2019/05/23 16:29:19 +0000",
            "ExitCode": 0,
            "InstanceId": "i-0abc",
            "LogLocal": "/data/jobA/log/run-tasks.0.log",
            "Memory": 300,
            "OdPrice": 0.096,
            "Spot": true,
            "SpotAz": "us-east-1a",
            "SpotPrice": 0.035,
            "Start": "2019/05/23 15:29:19 +0000",
            "SubnetId": "subnet-1",
            "WorkHours": 1.0,
            "vCpu": 1024
        }
    ],
    "KeyName": "jobA-0001",
    "No": 1,
    "SecurityGroupId": "sg-1",
    "Shell": "/bin/bash",
    "Spot": true,
    "TaskDefinitionAn": "arn:aws:ecs:us-east-1:123456789012:task-definition/jobA-0001:1",
    "UseAmazonEcr": false,
    "Wdir": "/data/jobA"
}"#;

    #[test]
    fn test_load_persisted_document() {
        let summary = RunSummary::from_json_slice(PERSISTED.as_bytes()).unwrap();
        assert_eq!(summary.cluster_name, "jobA-0001");
        assert_eq!(summary.round, 1);
        assert!(summary.auto_key);
        assert!(!summary.auto_security_group);
        assert!(summary.ami_id.is_empty());

        let job = &summary.jobs[0];
        assert_eq!(job.instance_type, "m5.large");
        assert_eq!(job.start, parse_standard_format("2019/05/23 15:29:19 +0000").unwrap());
        assert_eq!(job.memory, 300);
        assert_eq!(job.vcpu, 1024);
        assert!(job.used_spot);
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let broken = PERSISTED.replace("\"KeyName\": \"jobA-0001\",", "");
        assert!(RunSummary::from_json_slice(broken.as_bytes()).is_err());
    }

    #[test]
    fn test_reserialization_is_byte_stable() {
        let summary = RunSummary::from_json_slice(PERSISTED.as_bytes()).unwrap();
        let first = summary.to_json_bytes().unwrap();
        let reloaded = RunSummary::from_json_slice(&first).unwrap();
        let second = reloaded.to_json_bytes().unwrap();

        assert_eq!(first, second);
        assert_eq!(reloaded, summary);
    }

    #[test]
    fn test_work_hours_survive_reserialization() {
        use crate::cost::build_job_result;
        use crate::domain::resource::ResourceRequest;
        use chrono::Duration;

        let mut config = crate::config::SubmitConfig::new("/data", "jobA", 1);
        config.cluster_name = "jobA-0001".to_string();
        config.instance_type = "m5.large".to_string();
        let descriptor = ResourceDescriptor::from_config(&config).unwrap();

        let start = parse_standard_format("2019/05/23 15:29:19 +0000").unwrap();
        let mut request = ResourceRequest::new(true, "m5.large");
        request.od_price = 0.096;
        request.spot_price = 0.0351;

        let jobs: Vec<JobResult> = [33_i64, 1, 7, 59, 61, 3599, 3601, 86_399, 199_999]
            .into_iter()
            .chain((1..4000).step_by(37))
            .map(|secs| build_job_result(&request, start, start + Duration::seconds(secs), None, None, 0))
            .collect();
        let summary = RunSummary::from_descriptor(&descriptor, "/data/jobA", 1, jobs);

        let first = summary.to_json_bytes().unwrap();
        let reloaded = RunSummary::from_json_slice(&first).unwrap();
        let second = reloaded.to_json_bytes().unwrap();

        assert_eq!(reloaded.jobs[0].work_hours, 33.0 / 3600.0);
        assert_eq!(reloaded, summary);
        assert_eq!(first, second);
    }

    #[test]
    fn test_serialized_keys_are_sorted_and_indented() {
        let summary = RunSummary::from_json_slice(PERSISTED.as_bytes()).unwrap();
        let text = String::from_utf8(summary.to_json_bytes().unwrap()).unwrap();

        assert!(text.starts_with("{\n    \"AmiId\": \"\",\n    \"AutoKey\": true,"));
        let cluster = text.find("\"ClusterArn\"").unwrap();
        let wdir = text.find("\"Wdir\"").unwrap();
        assert!(cluster < wdir);
        assert!(text.contains("\n            \"vCpu\": 1024\n"));
    }

    #[test]
    fn test_from_summary_rehydrates_identity() {
        let summary = RunSummary::from_json_slice(PERSISTED.as_bytes()).unwrap();
        let descriptor = ResourceDescriptor::from_summary(&summary);

        assert_eq!(descriptor.cluster_name, "jobA-0001");
        assert_eq!(descriptor.cluster_arn, summary.cluster_arn);
        assert_eq!(descriptor.task_definition_arn, summary.task_definition_arn);
        assert_eq!(descriptor.key_name, "jobA-0001");
        assert_eq!(descriptor.key_ownership, Ownership::Owned);
        assert_eq!(descriptor.security_group_id, "sg-1");
        assert_eq!(descriptor.security_group_ownership, Ownership::External);
        assert!(descriptor.job_requests.is_empty());
        assert!(!descriptor.retry_on_demand);
        assert!(descriptor.subnet_id.is_empty());
    }

    #[test]
    fn test_summary_file_names() {
        assert_eq!(summary_file_name(3), "summary.003.log");
        assert_eq!(
            summary_path(Path::new("/data/jobA"), 12),
            PathBuf::from("/data/jobA/log/summary.012.log")
        );
        assert_eq!(parse_summary_file_name("summary.002.log"), Some(2));
        assert_eq!(parse_summary_file_name("summary.x.log"), None);
        assert!(is_summary_file_name("summary.x.log"));
        assert!(!is_summary_file_name("summary.log"));
        assert!(!is_summary_file_name("run-tasks.0.log"));
    }
}
