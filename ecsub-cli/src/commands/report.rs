//! Report command handler
//!
//! Prints the cost breakdown of every persisted round of a task.

use anyhow::{Context, Result};
use colored::*;
use ecsub_controller::{FsSummaryStore, SummaryError, service::round_costs};
use std::process::ExitCode;

use crate::config::Config;

pub fn handle_report_command(task_name: &str, config: &Config) -> Result<ExitCode> {
    let costs = match round_costs(&FsSummaryStore::new(), &config.wdir, task_name) {
        Ok(costs) => costs,
        Err(e @ SummaryError::TaskNotFound { .. }) => {
            eprintln!("{} {}", "[ecsub]".red(), e);
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read summaries of {}", task_name));
        }
    };

    let mut total = 0.0;
    for cost in &costs {
        println!(
            "{}",
            format!("{} round {}:", cost.cluster_name, cost.round).bold()
        );
        println!("  {}", format!("{:.3} USD", cost.report.total).green());
        for line in &cost.report.lines {
            println!("  {}", line.dimmed());
        }
        println!();
        total += cost.report.total;
    }

    println!(
        "{}",
        format!("Total of {} round(s): {:.3} USD", costs.len(), total).bold()
    );

    Ok(ExitCode::SUCCESS)
}
