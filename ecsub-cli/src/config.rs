//! Configuration module
//!
//! Handles CLI configuration: the working directory and how the aws CLI is
//! invoked.

use ecsub_provider::AwsCliProvider;
use std::path::PathBuf;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding one directory per task
    pub wdir: PathBuf,

    /// Region override, otherwise taken from the aws CLI profile
    pub region: Option<String>,

    /// aws executable
    pub aws_cli: String,
}

impl Config {
    /// Provider talking to the cloud through the configured aws CLI
    pub fn provider(&self) -> AwsCliProvider {
        let provider = AwsCliProvider::new().with_binary(&self.aws_cli);
        match &self.region {
            Some(region) => provider.with_region(region),
            None => provider,
        }
    }
}

