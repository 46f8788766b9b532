//! Delete command handler
//!
//! Releases the resources recorded in a task's summary.

use anyhow::{Context, Result};
use colored::*;
use ecsub_controller::{
    CleanupEntry, CleanupOutcome, CleanupReport, ClusterController, ControllerConfig,
    FsSummaryStore, SummaryError, service::delete_task,
};
use std::process::ExitCode;
use std::sync::Arc;

use crate::config::Config;

pub async fn handle_delete_command(task_name: &str, config: &Config) -> Result<ExitCode> {
    let controller_config = ControllerConfig::from_env().context("Invalid controller settings")?;
    let controller = ClusterController::new(
        Arc::new(config.provider()),
        controller_config.launch_timeout,
    );

    match delete_task(&FsSummaryStore::new(), &controller, &config.wdir, task_name).await {
        Ok(report) => {
            print_report(task_name, &report);
            Ok(ExitCode::SUCCESS)
        }
        Err(e @ SummaryError::TaskNotFound { .. }) => {
            eprintln!("{} {}", "[ecsub]".red(), e);
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to delete task {}", task_name)),
    }
}

fn print_report(task_name: &str, report: &CleanupReport) {
    println!("{}", format!("Cleanup of {}:", task_name).bold());
    for entry in &report.entries {
        print_entry(entry);
    }

    if report.is_clean() {
        println!("{}", "All owned resources released.".green());
    } else {
        println!(
            "{}",
            format!("{} resource(s) left behind.", report.leftovers().count()).yellow()
        );
    }
}

fn print_entry(entry: &CleanupEntry) {
    let outcome = match &entry.outcome {
        CleanupOutcome::Released => "released".green(),
        CleanupOutcome::SkippedExternal => "kept (external)".dimmed(),
        CleanupOutcome::SkippedNoHandle => "skipped (never created)".dimmed(),
        CleanupOutcome::NotFound => "already absent".yellow(),
        CleanupOutcome::InUse(msg) => format!("in use: {}", msg).red(),
        CleanupOutcome::Failed(msg) => format!("failed: {}", msg).red(),
    };

    println!("  {} {} {}: {}", "▸".cyan(), entry.kind, entry.handle.bold(), outcome);
}
