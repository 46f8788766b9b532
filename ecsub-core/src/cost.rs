//! Job cost model
//!
//! Pure accounting: elapsed hours from timestamps, job results from resource
//! requests, and the total cost of a round.

use chrono::{DateTime, Utc};
use std::path::PathBuf;

use crate::domain::job::JobResult;
use crate::domain::resource::ResourceRequest;
use crate::domain::summary::RunSummary;
use crate::dto::execution_log::InstanceFacts;
use crate::timefmt::truncate_to_seconds;

/// Hours between two timestamps
///
/// `end < start` is a caller bug and yields a negative value.
pub fn elapsed_hours(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 1000.0 / 3600.0
}

/// Merges a job's resource request with its timing and exit status
///
/// Without instance facts (no execution log, e.g. the instance never came
/// up) the cloud-specific fields stay zero or empty.
pub fn build_job_result(
    request: &ResourceRequest,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    log_local: Option<PathBuf>,
    facts: Option<&InstanceFacts>,
    exit_code: i32,
) -> JobResult {
    let start = truncate_to_seconds(start);
    let end = truncate_to_seconds(end);

    let mut result = JobResult {
        instance_type: request.instance_type.clone(),
        start,
        end,
        exit_code,
        log_local,
        od_price: request.od_price,
        used_spot: request.use_spot,
        spot_az: request.spot_az.clone(),
        spot_price: request.spot_price,
        work_hours: elapsed_hours(start, end),
        instance_id: String::new(),
        subnet_id: String::new(),
        memory: 0,
        vcpu: 0,
    };

    if let Some(facts) = facts {
        result.instance_id = facts.instance_id.clone();
        result.subnet_id = facts.subnet_id.clone();
        result.memory = facts.memory;
        result.vcpu = facts.vcpu;
    }

    result
}

/// Cost of a single job at the price actually paid
pub fn job_cost(job: &JobResult) -> f64 {
    job.paid_price() * elapsed_hours(job.start, job.end)
}

/// Cost breakdown of one round
#[derive(Debug, Clone, PartialEq)]
pub struct CostReport {
    pub total: f64,
    /// One line per job, in job order
    pub lines: Vec<String>,
}

impl CostReport {
    /// Message logged when a round's cost is printed
    pub fn message(&self) -> String {
        format!(
            "The cost of this job is {:.3} USD. \n{}",
            self.total,
            self.lines.join("\n")
        )
    }
}

/// Sums the cost of every job and renders one line per job
///
/// Each line shows the price paid and the price of the other purchasing
/// option.
pub fn aggregate_cost(summary: &RunSummary) -> CostReport {
    let mut total = 0.0;
    let mut lines = Vec::with_capacity(summary.jobs.len());

    for job in &summary.jobs {
        let hours = elapsed_hours(job.start, job.end);
        total += job.paid_price() * hours;

        let (label, other_label) = if job.used_spot {
            ("spot", "od")
        } else {
            ("ondemand", "spot")
        };

        lines.push(format!(
            " + instance-type {} ({}) {:.3} USD ({}: {:.3} USD), running-time {:.3} Hour",
            job.instance_type,
            label,
            job.paid_price(),
            other_label,
            job.alternative_price(),
            hours
        ));
    }

    CostReport { total, lines }
}
