//! ecsub CLI
//!
//! Command-line interface for inspecting and cleaning up the rounds a batch
//! left in its working directory.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ecsub")]
#[command(about = "Batch jobs on ephemeral cloud clusters", long_about = None)]
struct Cli {
    /// Working directory holding one directory per task
    #[arg(long, env = "ECSUB_WDIR", default_value = "./")]
    wdir: PathBuf,

    /// Region passed to every aws command
    #[arg(long, env = "AWS_DEFAULT_REGION")]
    region: Option<String>,

    /// aws executable
    #[arg(long, env = "ECSUB_AWS_CLI", default_value = "aws")]
    aws_cli: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ecsub=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = Config {
        wdir: cli.wdir,
        region: cli.region,
        aws_cli: cli.aws_cli,
    };

    handle_command(cli.command, &config).await
}
