//! Controller configuration
//!
//! Settings that tune how a round is driven rather than what it runs.

use ecsub_core::ConfigError;
use std::time::Duration;

/// Default number of job launches in flight at once
pub const DEFAULT_PROCESSES: usize = 20;

/// Default deadline of one launch attempt
pub const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_secs(600);

/// Controller configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Maximum number of jobs launched and executed concurrently
    pub processes: usize,

    /// Deadline of a single spot or on-demand launch attempt
    pub launch_timeout: Duration,

    /// Whether the cost report is logged when a summary is saved
    pub print_cost: bool,
}

impl ControllerConfig {
    pub fn new(processes: usize) -> Self {
        Self {
            processes,
            launch_timeout: DEFAULT_LAUNCH_TIMEOUT,
            print_cost: true,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - ECSUB_PROCESSES (optional, default: 20)
    /// - ECSUB_LAUNCH_TIMEOUT (optional, seconds, default: 600)
    /// - ECSUB_PRINT_COST (optional, true/false, default: true)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = env_var("ECSUB_PROCESSES") {
            config.processes = value
                .parse()
                .map_err(|_| ConfigError::invalid("ECSUB_PROCESSES", format!("not a number: {value}")))?;
        }

        if let Some(value) = env_var("ECSUB_LAUNCH_TIMEOUT") {
            let secs: u64 = value.parse().map_err(|_| {
                ConfigError::invalid("ECSUB_LAUNCH_TIMEOUT", format!("not a number: {value}"))
            })?;
            config.launch_timeout = Duration::from_secs(secs);
        }

        if let Some(value) = env_var("ECSUB_PRINT_COST") {
            config.print_cost = value
                .parse()
                .map_err(|_| ConfigError::invalid("ECSUB_PRINT_COST", format!("not a bool: {value}")))?;
        }

        Ok(config)
    }

    pub fn with_processes(mut self, processes: usize) -> Self {
        self.processes = processes;
        self
    }

    pub fn with_launch_timeout(mut self, launch_timeout: Duration) -> Self {
        self.launch_timeout = launch_timeout;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.processes == 0 {
            return Err(ConfigError::invalid("processes", "must be greater than 0"));
        }

        if self.launch_timeout.is_zero() {
            return Err(ConfigError::invalid("launch_timeout", "must be greater than 0"));
        }

        Ok(())
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PROCESSES)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
