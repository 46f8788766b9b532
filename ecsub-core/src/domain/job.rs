//! Job result domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::timefmt::serde_standard;

/// Exit code recorded for a job whose instance never came up
pub const LAUNCH_FAILED_EXIT_CODE: i32 = -1;

/// Facts about one finished (or failed) job
///
/// Written once into a run summary and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    #[serde(rename = "Ec2InstanceType")]
    pub instance_type: String,

    #[serde(rename = "Start", with = "serde_standard")]
    pub start: DateTime<Utc>,

    #[serde(rename = "End", with = "serde_standard")]
    pub end: DateTime<Utc>,

    #[serde(rename = "ExitCode")]
    pub exit_code: i32,

    /// Local copy of the execution log, if one was produced
    #[serde(rename = "LogLocal")]
    pub log_local: Option<PathBuf>,

    #[serde(rename = "OdPrice")]
    pub od_price: f64,

    #[serde(rename = "Spot")]
    pub used_spot: bool,

    #[serde(rename = "SpotAz")]
    pub spot_az: String,

    #[serde(rename = "SpotPrice")]
    pub spot_price: f64,

    #[serde(rename = "WorkHours")]
    pub work_hours: f64,

    #[serde(rename = "InstanceId")]
    pub instance_id: String,

    #[serde(rename = "SubnetId")]
    pub subnet_id: String,

    #[serde(rename = "Memory")]
    pub memory: u32,

    #[serde(rename = "vCpu")]
    pub vcpu: u32,
}

impl JobResult {
    /// Hourly price actually paid
    pub fn paid_price(&self) -> f64 {
        if self.used_spot {
            self.spot_price
        } else {
            self.od_price
        }
    }

    /// Hourly price of the purchasing option that was not used
    pub fn alternative_price(&self) -> f64 {
        if self.used_spot {
            self.od_price
        } else {
            self.spot_price
        }
    }

    /// Whether cloud-side facts were recovered from an execution log
    pub fn has_instance_facts(&self) -> bool {
        !self.instance_id.is_empty()
    }

    pub fn is_launch_failure(&self) -> bool {
        self.exit_code == LAUNCH_FAILED_EXIT_CODE
    }
}
