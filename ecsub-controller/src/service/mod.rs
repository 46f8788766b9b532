//! Service layer
//!
//! Entry points built on top of the controller and the repositories, plus
//! the seam through which a launched job's container run is handed off.
//!
//! The executor is trait-based so rounds can be driven without a real
//! container runtime.

mod cleanup;
mod execution;
mod report;

pub use cleanup::delete_task;
pub use execution::{ExecutionOutcome, TaskExecutor};
pub use report::{RoundCost, round_costs};
