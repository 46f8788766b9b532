//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod delete;
mod report;

use anyhow::Result;
use clap::Subcommand;
use std::process::ExitCode;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Release the cluster resources of a task
    Delete {
        /// Task name, the directory under the working directory
        task_name: String,
    },
    /// Show the cost of every persisted round of a task
    Report {
        /// Task name, the directory under the working directory
        task_name: String,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<ExitCode> {
    match command {
        Commands::Delete { task_name } => delete::handle_delete_command(&task_name, config).await,
        Commands::Report { task_name } => report::handle_report_command(&task_name, config),
    }
}
